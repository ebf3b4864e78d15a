use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Collection listing error: {0}")]
    CollectionList(String),

    #[error("Create document error: {0}")]
    CreateDocument(String),

    #[error("Update document error: {0}")]
    UpdateDocument(String),

    #[error("Remove document error: {0}")]
    RemoveDocument(String),

    #[error("Create collection error: {0}")]
    CreateCollection(String),

    #[error("Set aggregation pipeline error: {0}")]
    SetPipeline(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection limit reached")]
    ConnectionLimit,

    #[error("Operation timed out")]
    Timeout,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
