#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
