use thiserror::Error;

#[derive(Debug, Error)]
pub enum WheelmanError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Extraction error: {0}")]
    Extract(String),

    #[error("Every {chain} strategy failed")]
    ChainExhausted { chain: &'static str },

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WheelmanError>;
