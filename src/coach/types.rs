use async_trait::async_trait;

/// Errors from a text generation backend.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (refused, timed out, reset).
    #[error("generation request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("generation response error: status {status}")]
    Response { status: u16, body: String },

    /// The backend answered 200 with a body we could not read.
    #[error("generation response parse failed: {0}")]
    Parse(String),

    /// The backend answered with an empty completion.
    #[error("generation returned no text")]
    Empty,
}

/// Single-shot text completion. Implemented by [`super::OllamaGenerator`]
/// and by test doubles.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CoachError>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}
