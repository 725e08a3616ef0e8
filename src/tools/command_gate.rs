use crate::error::AppError;
use tracing::{debug, warn};

/// Allow-list check: only one named tool may be launched from the browser.
#[derive(Debug, Clone)]
pub struct CommandGate {
    allowed_tool: String,
}

impl CommandGate {
    pub fn new(allowed_tool: impl Into<String>) -> Self {
        Self {
            allowed_tool: allowed_tool.into(),
        }
    }

    /// Splits `cmd` on whitespace and returns the argument vector when its
    /// first token is exactly the allowed tool. No quoting, no path
    /// stripping, no alias resolution.
    pub fn check(&self, cmd: &str) -> Result<Vec<String>, AppError> {
        let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();

        match argv.first() {
            Some(program) if program == &self.allowed_tool => {
                debug!(program = %program, args = argv.len() - 1, "Command accepted");
                Ok(argv)
            }
            _ => {
                warn!(command = %cmd, allowed = %self.allowed_tool, "Command rejected");
                Err(AppError::CommandNotAllowed {
                    tool: self.allowed_tool.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_tool_with_arguments() {
        let gate = CommandGate::new("edp");
        assert_eq!(gate.check("edp build --force").unwrap(), vec!["edp", "build", "--force"]);
    }

    #[test]
    fn accepts_bare_tool() {
        let gate = CommandGate::new("edp");
        assert_eq!(gate.check("edp").unwrap(), vec!["edp"]);
    }

    #[test]
    fn collapses_runs_of_whitespace() {
        let gate = CommandGate::new("edp");
        assert_eq!(gate.check("  edp\tbuild   ").unwrap(), vec!["edp", "build"]);
    }

    #[test]
    fn rejects_other_programs_with_fixed_message() {
        let gate = CommandGate::new("edp");
        let err = gate.check("rm -rf /").unwrap_err();
        assert_eq!(err.to_string(), "Only `edp` command is allowed.");
    }

    #[test]
    fn match_is_exact() {
        let gate = CommandGate::new("edp");
        for cmd in ["EDP build", "/usr/bin/edp build", "edpx", "edp;rm", "", "   "] {
            assert!(gate.check(cmd).is_err(), "{cmd:?} should be rejected");
        }
    }

    #[test]
    fn tokens_are_passed_verbatim() {
        let gate = CommandGate::new("edp");
        let argv = gate.check("edp echo $(whoami) ; ls").unwrap();
        assert_eq!(argv, vec!["edp", "echo", "$(whoami)", ";", "ls"]);
    }
}
