use thiserror::Error;

/// The result type for the `structscan` crate.
pub type Result<T> = std::result::Result<T, StructscanError>;

/// The error type for the `structscan` crate.
///
/// Cancellation is not an error. Operations that can be cancelled return `Ok(None)` instead.
#[derive(Error, Debug)]
pub struct StructscanError {
    /// The source of the error.
    pub source: Box<StructscanErrorKind>,
}

impl StructscanError {
    /// Create a new `StructscanError`.
    pub fn new(kind: StructscanErrorKind) -> Self {
        StructscanError {
            source: Box::new(kind),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StructscanErrorKind {
        &self.source
    }
}

impl std::fmt::Display for StructscanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum StructscanErrorKind {
    /// A source or pattern text could not be lexed or parsed.
    #[error("Parse error at offset {offset}: {message}")]
    ParseError {
        /// Byte offset of the offending token.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// The selected search strategy does not provide the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// An encoded symbol stream is truncated or malformed.
    #[error("Malformed encoded stream: {0}")]
    EncodingError(String),

    /// A std::io error occurred.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl StructscanErrorKind {
    pub(crate) fn parse_error(offset: usize, message: impl Into<String>) -> StructscanError {
        StructscanError::new(StructscanErrorKind::ParseError {
            offset,
            message: message.into(),
        })
    }
}

impl From<std::io::Error> for StructscanError {
    fn from(error: std::io::Error) -> Self {
        StructscanError::new(StructscanErrorKind::IoError(error))
    }
}
