use thiserror::Error;

/// Classifies errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A pattern, name or rule failed validation
    InvalidInput,
    /// The node arena ran out of room
    Capacity,
    /// Options or rule files could not be interpreted
    Config,
    /// File open/read failure
    Io,
    /// A tree failed its structural self-check
    Internal,
}

/// SNI router error types
#[derive(Error, Debug)]
pub enum SniError {
    #[error("Invalid character {byte:#04x} at position {position}")]
    InvalidCharacter { byte: u8, position: usize },

    #[error("Name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Node arena exhausted ({capacity} nodes)")]
    ArenaExhausted { capacity: usize },

    #[error("Parse error at line {line}: {message}")]
    ParseErrorAtLine { line: usize, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown backend group: {0}")]
    UnknownGroup(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Trie invariant violated: {0}")]
    InvariantViolation(String),
}

impl SniError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SniError::InvalidCharacter { .. }
            | SniError::NameTooLong { .. }
            | SniError::InvalidPattern(_)
            | SniError::ParseErrorAtLine { .. }
            | SniError::ParseError(_)
            | SniError::UnknownGroup(_) => ErrorKind::InvalidInput,
            SniError::ArenaExhausted { .. } => ErrorKind::Capacity,
            SniError::ConfigError(_) => ErrorKind::Config,
            SniError::IoError(_) => ErrorKind::Io,
            SniError::InvariantViolation(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, SniError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_character_is_input_error() {
        let err = SniError::InvalidCharacter {
            byte: b'_',
            position: 3,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        match &err {
            SniError::InvalidCharacter { byte, position } => {
                assert_eq!(*byte, b'_');
                assert_eq!(*position, 3);
            }
            _ => panic!("expected InvalidCharacter"),
        }
    }

    #[test]
    fn test_invalid_character_display() {
        let err = SniError::InvalidCharacter {
            byte: b'_',
            position: 3,
        };
        let display = format!("{}", err);
        assert!(display.contains("0x5f"), "got: {}", display);
        assert!(display.contains("position 3"), "got: {}", display);
    }

    #[test]
    fn test_arena_exhausted_is_capacity_error() {
        let err = SniError::ArenaExhausted { capacity: 16 };
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(format!("{}", err).contains("16"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SniError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_parse_error_display_includes_line() {
        let err = SniError::ParseErrorAtLine {
            line: 7,
            message: "Invalid rule format".into(),
        };
        let display = format!("{}", err);
        assert!(display.contains("line 7"), "got: {}", display);
    }
}
