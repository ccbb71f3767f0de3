//! Check configuration model.
//!
//! # Purpose
//! A check is a scheduled command run on agents whose subscriptions match, with
//! results routed to the named handlers.
use super::{Resource, ValidationError, default_scope, validate_name, validate_scope};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub name: String,
    /// Execution interval in seconds.
    pub interval: u32,
    pub command: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub runtime_assets: Vec<String>,
    #[serde(default = "default_scope")]
    pub environment: String,
    #[serde(default = "default_scope")]
    pub organization: String,
}

impl Resource for CheckConfig {
    const KIND: &'static str = "checks";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if self.interval == 0 {
            return Err(ValidationError::new("check interval must be greater than 0"));
        }
        if self.command.trim().is_empty() {
            return Err(ValidationError::new("check command must be set"));
        }
        if self.subscriptions.iter().any(|s| s.trim().is_empty()) {
            return Err(ValidationError::new("check subscriptions cannot be empty"));
        }
        for handler in &self.handlers {
            validate_name(handler)
                .map_err(|err| ValidationError::new(format!("invalid handler name: {err}")))?;
        }
        validate_scope("environment", &self.environment)?;
        validate_scope("organization", &self.organization)
    }
}
