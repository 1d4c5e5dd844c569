pub type KinoraResult<T> = Result<T, KinoraError>;

#[derive(thiserror::Error, Debug)]
pub enum KinoraError {
    /// Invalid configuration or override specification. Detected before any
    /// rendering begins.
    #[error("validation error: {0}")]
    Validation(String),

    /// The animation document could not be parsed or lacks the structure an
    /// operation requires.
    #[error("document error: {0}")]
    Document(String),

    /// Fatal rendering failure: engine build, surface allocation, or sink
    /// output. Per-frame failures are counted, not raised.
    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KinoraError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}
