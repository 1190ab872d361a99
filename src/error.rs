use thiserror::Error;

/// A lexical error with the line the offending character sits on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[Line {line}] {message}")]
pub struct ScanError {
    pub line: usize,
    pub message: String,
}

/// A structural error reported against the token the parser was looking at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[Line {line}] {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// An evaluation failure. Carries no position; by the time the tree walker
/// runs, source locations are gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
        }
    }
}

/// Any failure a script run can produce, labelled by the stage it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Scanner Error:\n{0}")]
    Scan(#[from] ScanError),
    #[error("Parser Error:\n{0}")]
    Parse(#[from] ParseError),
    #[error("Runtime Error:\n{0}")]
    Runtime(#[from] RuntimeError),
}
