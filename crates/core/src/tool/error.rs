use std::borrow::Cow;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The model asked for a tool that isn't registered.
    UnknownTool,
    /// An argument is not recognized, or a required one is missing.
    InvalidArguments,
    /// An argument could not be coerced to its declared type.
    TypeMismatch,
    /// The input contains characters the tool refuses to process.
    DisallowedCharacter,
    /// The input was accepted but could not be evaluated.
    Evaluation,
    /// Error occurred while executing the tool.
    Execution,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnknownTool => write!(f, "Unknown tool"),
            ErrorKind::InvalidArguments => write!(f, "Invalid arguments"),
            ErrorKind::TypeMismatch => write!(f, "Type mismatch"),
            ErrorKind::DisallowedCharacter => {
                write!(f, "Disallowed character")
            }
            ErrorKind::Evaluation => write!(f, "Evaluation error"),
            ErrorKind::Execution => write!(f, "Execution error"),
        }
    }
}

/// Describes a tool call error.
///
/// Tool errors never abort a run. The registry renders them into an
/// observation, which the model can react to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates a new error with the `UnknownTool` kind.
    #[inline]
    pub fn unknown_tool() -> Self {
        Self::new(ErrorKind::UnknownTool)
    }

    /// Creates a new error with the `InvalidArguments` kind.
    #[inline]
    pub fn invalid_arguments() -> Self {
        Self::new(ErrorKind::InvalidArguments)
    }

    /// Creates a new error with the `TypeMismatch` kind.
    #[inline]
    pub fn type_mismatch() -> Self {
        Self::new(ErrorKind::TypeMismatch)
    }

    /// Creates a new error with the `DisallowedCharacter` kind.
    #[inline]
    pub fn disallowed_character() -> Self {
        Self::new(ErrorKind::DisallowedCharacter)
    }

    /// Creates a new error with the `Evaluation` kind.
    #[inline]
    pub fn evaluation() -> Self {
        Self::new(ErrorKind::Evaluation)
    }

    /// Creates a new error with the `Execution` kind.
    #[inline]
    pub fn execution_error() -> Self {
        Self::new(ErrorKind::Execution)
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}
