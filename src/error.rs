use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("unknown snapshot id: {0}")]
    UnknownSnapshot(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model server error: {0}")]
    ModelServer(#[from] reqwest::Error),

    #[error("narrative backend error: {0}")]
    Narrative(String),

    #[error("encoder backend error: {0}")]
    Encoder(String),

    #[error("monitor loop stopped: {0}")]
    Schedule(String),
}
