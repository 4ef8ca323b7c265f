//! Literal success strings printed by the host tools
//!
//! `{service}` in a template is replaced by the service name.

use serde::{Deserialize, Serialize};

/// Wording printed by `net` and `sc`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceMessages {
    /// Suffix of `net start` output on success
    pub started: String,
    /// Suffix of `net stop` output on success
    pub stopped: String,
    /// State token in `sc query` output for a running service
    pub running_state: String,
    /// State token in `sc query` output for a stopped service
    pub stopped_state: String,
}

impl Default for ServiceMessages {
    fn default() -> Self {
        Self {
            started: "The {service} service was started successfully.".to_string(),
            stopped: "The {service} service was stopped successfully.".to_string(),
            running_state: "RUNNING".to_string(),
            stopped_state: "STOPPED".to_string(),
        }
    }
}

impl ServiceMessages {
    /// Expected `net start` suffix for `service`
    pub fn started_for(&self, service: &str) -> String {
        self.started.replace("{service}", service)
    }

    /// Expected `net stop` suffix for `service`
    pub fn stopped_for(&self, service: &str) -> String {
        self.stopped.replace("{service}", service)
    }
}

/// Wording printed by `netsh advfirewall`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallMessages {
    /// Full output of a successful `add rule`
    pub created: String,
    /// Full output of a successful `delete rule`
    pub deleted: String,
}

impl Default for FirewallMessages {
    fn default() -> Self {
        Self {
            created: "Ok.".to_string(),
            deleted: "Deleted 1 rule(s).Ok.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_render_service_name() {
        let messages = ServiceMessages::default();
        assert_eq!(
            messages.started_for("Env_Postgresql"),
            "The Env_Postgresql service was started successfully."
        );
        assert_eq!(
            messages.stopped_for("Env_Postgresql"),
            "The Env_Postgresql service was stopped successfully."
        );
    }
}
