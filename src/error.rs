#[derive(Debug, thiserror::Error)]
pub enum LoadTestError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Upstream LLM error: {0}")]
    UpstreamError(String),
    #[error("Prompt pool is empty")]
    EmptyPromptPool,
    #[error("Run aborted: {0}")]
    RunAborted(String),
    #[error("Shutdown timeout")]
    ShutdownTimeout,
}
