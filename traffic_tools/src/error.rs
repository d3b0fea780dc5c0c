use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrafficApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The traffic API key is not configured")]
    NotConfigured,
    #[error("Invalid request: {0}")]
    RequestError(String),
    #[error("Invalid response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Upstream rejected the request. Code {code}. {message}")]
    Rejected { code: i64, message: String },
}
