use thiserror::Error;

pub mod ini;
pub use ini::{IniDocument, Section, DEFAULT_SECTION};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    ConfigFileNotFound { path: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Section [{section}] defined twice (line {line})")]
    DuplicateSection { section: String, line: usize },

    #[error("Option '{key}' in section [{section}] defined twice (line {line})")]
    DuplicateKey {
        section: String,
        key: String,
        line: usize,
    },

    #[error("Missing section: [{section}]")]
    MissingSection { section: String },

    #[error("Missing option '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },

    #[error("Cannot interpolate [{section}] {key}: {message}")]
    Interpolation {
        section: String,
        key: String,
        message: String,
    },

    #[error("Invalid value '{value}' for [{section}] {key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        message: String,
    },
}
