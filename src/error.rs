//! Error types for metric collection.

use std::path::PathBuf;

/// Failure of a single producer.
///
/// Producer failures never abort a scrape; they are rendered as a
/// `## retrieve metric #N: ...` comment line instead.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {what} from {text:?}")]
    Parse { what: String, text: String },

    #[error("exec {program}: {reason}")]
    Command { program: String, reason: String },

    #[error("ups: {0}")]
    Ups(String),

    #[error("ping {target}: {reason}")]
    Ping { target: String, reason: String },

    #[error("speedtest: {0}")]
    Bandwidth(String),

    #[error("producer panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Message(String),
}

impl CollectError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CollectError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, text: impl Into<String>) -> Self {
        CollectError::Parse {
            what: what.into(),
            text: text.into(),
        }
    }
}

/// A producer failure tagged with the producer's 1-based position.
#[derive(Debug, thiserror::Error)]
#[error("retrieve metric #{ordinal}: {source}")]
pub struct ProducerError {
    pub ordinal: usize,
    #[source]
    pub source: CollectError,
}

pub type Result<T> = std::result::Result<T, CollectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_error_display() {
        let err = ProducerError {
            ordinal: 2,
            source: CollectError::Message("connection refused".into()),
        };
        assert_eq!(err.to_string(), "retrieve metric #2: connection refused");
    }

    #[test]
    fn test_parse_error_display() {
        let err = CollectError::parse("load average", "abc");
        assert_eq!(err.to_string(), "parse load average from \"abc\"");
    }
}
