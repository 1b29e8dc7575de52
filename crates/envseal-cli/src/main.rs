//! envseal: versioned envelope encryption CLI
//!
//! Commands:
//!   encrypt                  - seal stdin into a 004 envelope
//!   decrypt [ENVELOPE]       - open an envelope of any known scheme
//!   check <VALUE>            - report whether VALUE looks like an envelope
//!   keys ensure <LABEL>      - provision a key and print its fingerprint
//!   config show              - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use envseal_core::config::{EnvsealConfig, KeySourceKind};
use envseal_crypto::{envelope_version, is_well_formed_envelope, Codec, KdfParams};
use envseal_keys::{FileBackend, KeyProvider, KeySource};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "envseal",
    version,
    about = "Versioned envelope encryption for values at rest"
)]
struct Cli {
    /// Path to envseal.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "ENVSEAL_CONFIG",
        default_value = "/etc/envseal/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "ENVSEAL_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "ENVSEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceArg {
    File,
    Store,
}

impl From<SourceArg> for KeySource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::File => KeySource::File,
            SourceArg::Store => KeySource::Store,
        }
    }
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    /// Key backend (default: keys.source from config)
    #[arg(long, short = 's')]
    source: Option<SourceArg>,

    /// Read the passphrase from this environment variable
    #[arg(long, conflicts_with = "prompt")]
    passphrase_env: Option<String>,

    /// Prompt for a passphrase on the terminal
    #[arg(long)]
    prompt: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt stdin into a 004 envelope
    ///
    /// The plaintext is only ever read from stdin so it never shows up in
    /// the process argument list.
    Encrypt {
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Decrypt an envelope of any known scheme
    Decrypt {
        /// Envelope to decrypt (default: read stdin)
        envelope: Option<String>,
        /// Refuse envelopes older than this scheme version
        #[arg(long)]
        min_version: Option<u16>,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Report whether a value is a well-formed envelope
    Check {
        value: String,
    },

    /// Key provisioning
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// Create the key if absent and print its fingerprint
    Ensure {
        /// Key label, e.g. foura
        label: String,
        /// Key backend (default: keys.source from config)
        #[arg(long, short = 's')]
        source: Option<SourceArg>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EnvsealConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    init_logging(&cli, &config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "envseal starting"
    );

    match cli.command {
        Commands::Encrypt { keys } => cmd_encrypt(&config, &keys),
        Commands::Decrypt {
            envelope,
            min_version,
            keys,
        } => cmd_decrypt(&config, envelope, min_version, &keys),
        Commands::Check { value } => cmd_check(&value),
        Commands::Keys {
            action: KeysAction::Ensure { label, source },
        } => cmd_keys_ensure(&config, &label, source),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(cli: &Cli, config: &EnvsealConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = cli.log_format.unwrap_or(if config.log.format == "json" {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries envelopes and plaintext; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn resolve_source(config: &EnvsealConfig, arg: Option<SourceArg>) -> KeySource {
    arg.map(KeySource::from)
        .unwrap_or_else(|| KeySource::from(config.keys.source))
}

/// Build a provider with the file backend, plus the store backend when it is
/// the selected source (opening RocksDB takes an exclusive lock).
fn build_provider(config: &EnvsealConfig, source: KeySource) -> Result<KeyProvider> {
    let provider = KeyProvider::new().with_file_backend(FileBackend::new(&config.keys.key_dir));
    if source != KeySource::Store {
        return Ok(provider);
    }

    #[cfg(feature = "rocksdb")]
    return with_rocksdb_store(provider, config);

    #[cfg(not(feature = "rocksdb"))]
    anyhow::bail!(
        "store key source requires the rocksdb feature: cargo build --features rocksdb \
         (configured store path: {})",
        config.keys.store_path.display()
    )
}

#[cfg(feature = "rocksdb")]
fn with_rocksdb_store(provider: KeyProvider, config: &EnvsealConfig) -> Result<KeyProvider> {
    let store = envseal_keys::RocksDbKeyStore::open(&config.keys.store_path)
        .with_context(|| format!("opening key store: {}", config.keys.store_path.display()))?;
    Ok(provider.with_store_backend(envseal_keys::StoreBackend::new(std::sync::Arc::new(store))))
}

fn read_passphrase(args: &KeyArgs) -> Result<Option<SecretString>> {
    if let Some(var) = &args.passphrase_env {
        let value = std::env::var(var)
            .with_context(|| format!("passphrase variable {var} is not set"))?;
        return Ok(Some(SecretString::from(value)));
    }
    if args.prompt {
        let value = rpassword::prompt_password("Passphrase: ").context("reading passphrase")?;
        return Ok(Some(SecretString::from(value)));
    }
    Ok(None)
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("reading stdin")?;
    Ok(buf)
}

fn fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_encrypt(config: &EnvsealConfig, args: &KeyArgs) -> Result<()> {
    let source = resolve_source(config, args.source);
    let codec = Codec::new(build_provider(config, source)?, KdfParams::from(&config.kdf));
    let passphrase = read_passphrase(args)?;

    let value = zeroize::Zeroizing::new(read_stdin()?);

    let envelope = codec
        .encrypt(&value, passphrase.as_ref(), source)
        .context("encryption failed")?;
    println!("{envelope}");
    Ok(())
}

fn cmd_decrypt(
    config: &EnvsealConfig,
    envelope: Option<String>,
    min_version: Option<u16>,
    args: &KeyArgs,
) -> Result<()> {
    let source = resolve_source(config, args.source);
    let codec = Codec::new(build_provider(config, source)?, KdfParams::from(&config.kdf));
    let passphrase = read_passphrase(args)?;

    let envelope = match envelope {
        Some(e) => e,
        None => String::from_utf8(read_stdin()?).context("envelope is not UTF-8 text")?,
    };
    let envelope = envelope.trim();

    let plaintext = match min_version {
        Some(minimum) => codec.decrypt_min_version(envelope, passphrase.as_ref(), source, minimum),
        None => codec.decrypt(envelope, passphrase.as_ref(), source),
    }
    .context("decryption failed")?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&plaintext).context("writing plaintext")?;
    stdout.flush().context("flushing stdout")?;
    Ok(())
}

fn cmd_check(value: &str) -> Result<()> {
    if is_well_formed_envelope(value) {
        let version = envelope_version(value).unwrap_or_default();
        println!("envelope: yes (scheme {version:03})");
    } else {
        println!("envelope: no");
    }
    Ok(())
}

fn cmd_keys_ensure(config: &EnvsealConfig, label: &str, source: Option<SourceArg>) -> Result<()> {
    let source = resolve_source(config, source);
    let provider = build_provider(config, source)?;
    let key = provider
        .get_or_create(label, source)
        .with_context(|| format!("provisioning key '{label}'"))?;
    println!("{label} ({source}): {}", fingerprint(key.as_bytes()));
    Ok(())
}

fn cmd_config_show(config: &EnvsealConfig, path: &Path) -> Result<()> {
    println!("# envseal config (source: {})", path.display());
    print!("{}", config.to_toml_string()?);
    if config.keys.source == KeySourceKind::Store && cfg!(not(feature = "rocksdb")) {
        println!("# warning: keys.source = \"store\" but this build lacks the rocksdb feature");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_encrypt_rejects_plaintext_argument() {
        assert!(Cli::try_parse_from(["envseal", "encrypt", "hunter2"]).is_err());
        let cli = Cli::try_parse_from(["envseal", "encrypt", "--source", "store"]).unwrap();
        assert!(matches!(cli.command, Commands::Encrypt { .. }));
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let fp = fingerprint(&[0u8; 32]);
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_source_defaults_to_config() {
        let mut config = EnvsealConfig::default();
        assert_eq!(resolve_source(&config, None), KeySource::File);
        config.keys.source = KeySourceKind::Store;
        assert_eq!(resolve_source(&config, None), KeySource::Store);
        assert_eq!(resolve_source(&config, Some(SourceArg::File)), KeySource::File);
    }
}
