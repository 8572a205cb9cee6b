use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while parsing or evaluating a command line.
///
/// A request to terminate the shell is not an error; see [`crate::command::Status`].
#[derive(Debug, Error)]
pub enum ShellError {
    /// Malformed command string: unmatched quotes, misplaced operators,
    /// ambiguous or conflicting redirections.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A redirection target could not be opened.
    #[error("{}: {source}", path.display())]
    Stream {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to one of the wired streams failed.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// No built-in is registered under this name.
    #[error("{0}: command not found")]
    Dispatch(String),

    /// A built-in rejected its arguments or failed while running.
    ///
    /// `message` is already prefixed with the built-in's name.
    #[error("{message}")]
    Application { name: String, message: String },
}

impl ShellError {
    pub(crate) fn syntax(msg: impl Into<String>) -> Self {
        ShellError::Syntax(msg.into())
    }

    /// Errors a sequence step may swallow and report inline.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ShellError::Syntax(_))
    }
}

pub type ShellResult<T> = Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_message_is_not_decorated() {
        let err = ShellError::Application {
            name: "cat".to_string(),
            message: "cat: missing.txt: not found".to_string(),
        };
        assert_eq!(err.to_string(), "cat: missing.txt: not found");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_syntax_is_fatal() {
        let err = ShellError::syntax("unmatched quote");
        assert_eq!(err.to_string(), "syntax error: unmatched quote");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_stream_error_names_the_file() {
        let err = ShellError::Stream {
            path: PathBuf::from("out/missing.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "out/missing.txt: no such file");
    }
}
