//! Error types for device links.

use core::fmt;
use thiserror::Error;

pub type LinkResult<T> = Result<T, LinkError>;

/// Which serial link an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Valve,
    Mfc,
    Temperature,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Valve => f.write_str("valve"),
            LinkKind::Mfc => f.write_str("MFC"),
            LinkKind::Temperature => f.write_str("temperature"),
        }
    }
}

/// Transient device I/O failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    /// The link could not complete the exchange.
    #[error("I/O failure on {link} link: {message}")]
    Io { link: LinkKind, message: String },

    /// The device answered, but not in a form we can use.
    #[error("Malformed response from {link} link: {what}")]
    Malformed { link: LinkKind, what: String },
}

impl LinkError {
    pub fn io(link: LinkKind, err: impl fmt::Display) -> Self {
        LinkError::Io {
            link,
            message: err.to_string(),
        }
    }

    pub fn malformed(link: LinkKind, what: impl Into<String>) -> Self {
        LinkError::Malformed {
            link,
            what: what.into(),
        }
    }

    pub fn link(&self) -> LinkKind {
        match self {
            LinkError::Io { link, .. } | LinkError::Malformed { link, .. } => *link,
        }
    }
}
