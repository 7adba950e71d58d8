//! Errors raised while loading or writing EvalSwipe configuration

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing the config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file could not be parsed or serialized
    #[error("Configuration error: {0}")]
    Config(String),
}
