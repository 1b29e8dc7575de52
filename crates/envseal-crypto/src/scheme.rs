//! Scheme versions and their key labels.

/// Every envelope scheme ever shipped. Entries are only ever added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scheme {
    /// Unauthenticated AES-256-CBC
    V1,
    /// AES-256-CBC + HMAC-SHA256
    V2,
    /// AES-256-CBC + HMAC-SHA256, separate key pair from V2
    V3,
    /// AES-256-CBC + HMAC-SHA384
    V4,
}

impl Scheme {
    /// The scheme all new envelopes are written with.
    pub const CURRENT: Scheme = Scheme::V4;

    pub fn from_number(version: u16) -> Option<Self> {
        match version {
            1 => Some(Scheme::V1),
            2 => Some(Scheme::V2),
            3 => Some(Scheme::V3),
            4 => Some(Scheme::V4),
            _ => None,
        }
    }

    pub fn number(self) -> u16 {
        match self {
            Scheme::V1 => 1,
            Scheme::V2 => 2,
            Scheme::V3 => 3,
            Scheme::V4 => 4,
        }
    }

    /// Zero-padded 3-digit envelope tag, e.g. `"004"`.
    pub fn tag(self) -> String {
        format!("{:03}", self.number())
    }

    fn label_stem(self) -> &'static str {
        match self {
            Scheme::V1 => "one",
            Scheme::V2 => "two",
            Scheme::V3 => "three",
            Scheme::V4 => "four",
        }
    }

    /// Provisioned-key label for the encryption role.
    ///
    /// V1 has a single key, so it uses the bare stem for both roles.
    pub fn encryption_label(self) -> String {
        match self {
            Scheme::V1 => self.label_stem().to_string(),
            _ => format!("{}a", self.label_stem()),
        }
    }

    /// Provisioned-key label for the authentication role.
    pub fn authentication_label(self) -> String {
        match self {
            Scheme::V1 => self.label_stem().to_string(),
            _ => format!("{}b", self.label_stem()),
        }
    }
}
