/// Failure to obtain an equipment's event log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Connection failure or a non-2xx response.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the transport timeout.
    #[error("Request timed out")]
    Timeout,

    /// The response body could not be decoded as text.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// No source is configured for the requested equipment id.
    #[error("Unknown equipment: {0}")]
    UnknownEquipment(String),
}
