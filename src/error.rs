use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Xml(roxmltree::Error),
    /// The package is readable but is not a usable HWPX document.
    InvalidHwpx(String),
    /// The document model contains no sections to lay out.
    EmptyDocument,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Xml(e) => write!(f, "XML parse error: {e}"),
            Error::InvalidHwpx(msg) => write!(f, "invalid HWPX: {msg}"),
            Error::EmptyDocument => write!(f, "document has no sections"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}
