use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error("Only `{tool}` command is allowed.")]
    CommandNotAllowed { tool: String },

    #[error("Failed to launch `{command}`: {source}")]
    SpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid client frame: {0}")]
    InvalidFrame(String),

    #[error("Extension error: {0}")]
    ExtensionError(String),
}

impl AppError {
    /// Text shown to the browser on the `cmd-stderr` channel when a launch
    /// request does not produce a run.
    pub fn client_message(&self) -> String {
        match self {
            AppError::CommandNotAllowed { .. } | AppError::SpawnError { .. } => self.to_string(),
            other => format!("Launch failed: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_message_is_fixed() {
        let err = AppError::CommandNotAllowed {
            tool: "edp".to_string(),
        };
        assert_eq!(err.client_message(), "Only `edp` command is allowed.");
    }

    #[test]
    fn spawn_error_names_command_and_cause() {
        let err = AppError::SpawnError {
            command: "edp build".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        let msg = err.client_message();
        assert!(msg.starts_with("Failed to launch `edp build`"));
        assert!(msg.contains("No such file or directory"));
    }

    #[test]
    fn other_errors_are_prefixed() {
        let err = AppError::InvalidFrame("missing cwd".to_string());
        assert_eq!(err.client_message(), "Launch failed: Invalid client frame: missing cwd");
    }
}
