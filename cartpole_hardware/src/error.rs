use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("transport closed")]
    TransportClosed,
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HwError {
    fn from(e: std::io::Error) -> Self {
        HwError::Io(e.to_string())
    }
}
