use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] mc_protocol::ProtocolError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ProxyError>;
