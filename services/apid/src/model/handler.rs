//! Event handler model.
//!
//! # Purpose
//! A handler describes where check results go: a piped command, a TCP/UDP
//! socket, or a set of other handlers.
use super::{Resource, ValidationError, default_scope, validate_name, validate_scope};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerType {
    Pipe,
    Tcp,
    Udp,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSocket {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub handler_type: HandlerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutator: Option<String>,
    #[serde(default)]
    pub command: String,
    /// Execution timeout in seconds; zero means no timeout.
    #[serde(default)]
    pub timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<HandlerSocket>,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default = "default_scope")]
    pub environment: String,
    #[serde(default = "default_scope")]
    pub organization: String,
}

impl Resource for Handler {
    const KIND: &'static str = "handlers";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if let Some(mutator) = &self.mutator {
            validate_name(mutator)
                .map_err(|err| ValidationError::new(format!("invalid mutator name: {err}")))?;
        }
        match self.handler_type {
            HandlerType::Pipe => {
                if self.command.trim().is_empty() {
                    return Err(ValidationError::new("pipe handler requires a command"));
                }
            }
            HandlerType::Tcp | HandlerType::Udp => {
                let socket = self
                    .socket
                    .as_ref()
                    .ok_or_else(|| ValidationError::new("socket handler requires a socket"))?;
                if socket.host.trim().is_empty() {
                    return Err(ValidationError::new("socket host must be set"));
                }
                if socket.port == 0 {
                    return Err(ValidationError::new("socket port must be set"));
                }
            }
            HandlerType::Set => {
                if self.handlers.is_empty() {
                    return Err(ValidationError::new("set handler requires member handlers"));
                }
                for member in &self.handlers {
                    validate_name(member).map_err(|err| {
                        ValidationError::new(format!("invalid handler name: {err}"))
                    })?;
                    if member == &self.name {
                        return Err(ValidationError::new("set handler cannot contain itself"));
                    }
                }
            }
        }
        validate_scope("environment", &self.environment)?;
        validate_scope("organization", &self.organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(value: serde_json::Value) -> Handler {
        serde_json::from_value(value).expect("decode handler")
    }

    #[test]
    fn pipe_handler_requires_command() {
        let h = decode(serde_json::json!({ "name": "slack", "type": "pipe" }));
        assert!(h.validate().is_err());

        let h = decode(serde_json::json!({
            "name": "slack",
            "type": "pipe",
            "command": "handler-slack"
        }));
        assert!(h.validate().is_ok());
    }

    #[test]
    fn socket_handlers_require_host_and_port() {
        let h = decode(serde_json::json!({ "name": "graphite", "type": "tcp" }));
        assert!(h.validate().is_err());

        let h = decode(serde_json::json!({
            "name": "graphite",
            "type": "udp",
            "socket": { "host": "127.0.0.1", "port": 0 }
        }));
        assert!(h.validate().is_err());

        let h = decode(serde_json::json!({
            "name": "graphite",
            "type": "tcp",
            "socket": { "host": "127.0.0.1", "port": 2003 }
        }));
        assert!(h.validate().is_ok());
    }

    #[test]
    fn set_handler_rejects_self_reference() {
        let h = decode(serde_json::json!({
            "name": "everything",
            "type": "set",
            "handlers": ["slack", "everything"]
        }));
        assert_eq!(
            h.validate().unwrap_err().to_string(),
            "set handler cannot contain itself"
        );
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let result: Result<Handler, _> =
            serde_json::from_value(serde_json::json!({ "name": "x", "type": "email" }));
        assert!(result.is_err());
    }
}
