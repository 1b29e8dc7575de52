pub mod config;
pub mod error;

pub use config::{EnvsealConfig, KeySourceKind};
pub use error::{EnvsealError, EnvsealResult};
