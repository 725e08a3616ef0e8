use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the only built-in inbound event.
pub const LAUNCH_EVENT: &str = "launch";

/// A browser's request to run a command line in a directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LaunchRequest {
    pub cmd: String,
    pub cwd: String,
}

/// The `{event, data}` envelope every frame uses in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
struct Envelope {
    event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

/// Events the browser sends. Frames look like
/// `{"event": "launch", "data": {"cmd": "edp build", "cwd": "/tmp/project"}}`.
/// Any other event name is left for extension handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Launch(LaunchRequest),
    Extension { event: String, data: Value },
}

/// Events the server sends back on the connection that launched the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    CmdStdout(String),
    CmdStderr(String),
    /// No payload: the process exit status is not part of the protocol.
    CmdExit,
    /// An event emitted by an extension, framed under its own name.
    #[serde(skip)]
    Extension { event: String, data: Value },
}

impl ServerEvent {
    pub fn extension(event: impl Into<String>, data: Value) -> Self {
        ServerEvent::Extension {
            event: event.into(),
            data,
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        match self {
            ServerEvent::Extension { event, data } => serde_json::to_string(&Envelope {
                event: event.clone(),
                data: data.clone(),
            }),
            builtin => serde_json::to_string(builtin),
        }
    }
}

pub fn parse_client_frame(text: &str) -> Result<ClientEvent, serde_json::Error> {
    let Envelope { event, data } = serde_json::from_str(text)?;
    if event == LAUNCH_EVENT {
        return serde_json::from_value(data).map(ClientEvent::Launch);
    }
    Ok(ClientEvent::Extension { event, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn parses_launch_frame() {
        let event =
            parse_client_frame(r#"{"event":"launch","data":{"cmd":"edp build","cwd":"/tmp/project"}}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::Launch(LaunchRequest {
                cmd: "edp build".to_string(),
                cwd: "/tmp/project".to_string(),
            })
        );
    }

    #[test]
    fn rejects_malformed_launch_and_non_envelopes() {
        assert!(parse_client_frame(r#"{"event":"launch","data":{"cmd":"edp"}}"#).is_err());
        assert!(parse_client_frame(r#"{"event":"launch"}"#).is_err());
        assert!(parse_client_frame(r#"{"data":{}}"#).is_err());
        assert!(parse_client_frame("not json").is_err());
    }

    #[test]
    fn other_event_names_are_passed_through() {
        assert_eq!(
            parse_client_frame(r#"{"event":"lint-file","data":{"path":"src/a.js"}}"#).unwrap(),
            ClientEvent::Extension {
                event: "lint-file".to_string(),
                data: json!({"path": "src/a.js"}),
            }
        );
        assert_eq!(
            parse_client_frame(r#"{"event":"ping"}"#).unwrap(),
            ClientEvent::Extension {
                event: "ping".to_string(),
                data: Value::Null,
            }
        );
    }

    #[test]
    fn server_frames_match_event_names() {
        let stdout: Value =
            serde_json::from_str(&ServerEvent::CmdStdout("Done\n".into()).to_frame().unwrap()).unwrap();
        assert_eq!(stdout, json!({"event": "cmd-stdout", "data": "Done\n"}));

        let stderr: Value =
            serde_json::from_str(&ServerEvent::CmdStderr("oops".into()).to_frame().unwrap()).unwrap();
        assert_eq!(stderr, json!({"event": "cmd-stderr", "data": "oops"}));

        let exit: Value = serde_json::from_str(&ServerEvent::CmdExit.to_frame().unwrap()).unwrap();
        assert_eq!(exit, json!({"event": "cmd-exit"}));
    }

    #[test]
    fn extension_frames_use_their_own_name() {
        let frame = ServerEvent::extension("lint-result", json!({"errors": 0}))
            .to_frame()
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"event": "lint-result", "data": {"errors": 0}}));

        let bare: Value =
            serde_json::from_str(&ServerEvent::extension("pong", Value::Null).to_frame().unwrap()).unwrap();
        assert_eq!(bare, json!({"event": "pong"}));
    }
}
