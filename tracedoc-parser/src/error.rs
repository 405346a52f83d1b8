use std::path::PathBuf;

/// Errors that abort preprocessing.
///
/// Malformed markup never lands here: unresolved references, bad include
/// targets and mismatched directives are all recovered locally (and logged).
/// Only structural impossibilities and unreadable input abort a parse.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A file includes itself, directly or through a chain of includes.
    #[error("include cycle detected: {0} is already being expanded")]
    IncludeCycle(PathBuf),

    /// The include nesting ceiling was hit before a cycle was detected.
    #[error("maximum include depth ({0}) exceeded while expanding {1}")]
    IncludeDepthExceeded(usize, PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The `encoding=` label on an include directive names no known encoding.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// The file has no BOM and is not valid UTF-8.
    #[error("unrecognized encoding in file: {0}")]
    UnrecognizedEncodingInFile(PathBuf),
}
