use thiserror::Error;

/// Failure classes a conversion can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    FontResolutionExhausted,
    Render,
    OutputWrite,
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("no font could be resolved: {0}")]
    FontResolutionExhausted(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("output write error: {0}")]
    OutputWrite(String),
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::MalformedInput(_) => ErrorKind::MalformedInput,
            ConvertError::FontResolutionExhausted(_) => ErrorKind::FontResolutionExhausted,
            ConvertError::Render(_) => ErrorKind::Render,
            ConvertError::OutputWrite(_) => ErrorKind::OutputWrite,
        }
    }

    pub(crate) fn render(err: impl std::fmt::Display) -> Self {
        ConvertError::Render(err.to_string())
    }

    pub(crate) fn output(err: impl std::fmt::Display) -> Self {
        ConvertError::OutputWrite(err.to_string())
    }
}
