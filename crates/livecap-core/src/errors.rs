use thiserror::Error;

#[derive(Debug, Error)]
pub enum LivecapError {
    #[error("session closed")]
    SessionClosed,
    #[error("settings error: {0}")]
    Settings(String),
}
