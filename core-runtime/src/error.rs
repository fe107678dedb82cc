use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected before anything was started
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
