//! OS firewall verbs

use crate::error::{Error, Result};
use crate::messages::FirewallMessages;
use async_trait::async_trait;
use command_executor::{Command, CommandRunner, Expectation, OutputVerifier};
use std::sync::Arc;

/// Control over inbound firewall rules
#[async_trait]
pub trait FirewallControl: Send + Sync {
    /// Whether a rule with this name exists
    async fn rule_exists(&self, rule: &str) -> Result<bool>;

    /// Create an inbound rule allowing TCP on `port`
    async fn create_tcp_allow_rule(&self, rule: &str, port: u16) -> Result<()>;

    /// Delete the rule with this name
    async fn remove_rule(&self, rule: &str) -> Result<()>;
}

/// Windows firewall control through `netsh advfirewall firewall`
pub struct NetshFirewall {
    runner: Arc<dyn CommandRunner>,
    messages: FirewallMessages,
}

impl NetshFirewall {
    /// Create a controller using the default English wording
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_messages(runner, FirewallMessages::default())
    }

    /// Create a controller with custom wording
    pub fn with_messages(runner: Arc<dyn CommandRunner>, messages: FirewallMessages) -> Self {
        Self { runner, messages }
    }

    fn netsh(verb: &str, rule: &str) -> Command {
        let mut cmd = Command::new("netsh");
        cmd.args(["advfirewall", "firewall", verb, "rule"])
            .arg(format!("name={}", rule));
        cmd
    }
}

#[async_trait]
impl FirewallControl for NetshFirewall {
    async fn rule_exists(&self, rule: &str) -> Result<bool> {
        let result = self.runner.run(Self::netsh("show", rule)).await?;
        Ok(result.out().contains(rule))
    }

    async fn create_tcp_allow_rule(&self, rule: &str, port: u16) -> Result<()> {
        let mut cmd = Self::netsh("add", rule);
        cmd.args(["dir=in", "action=allow", "protocol=TCP"])
            .arg(format!("localport={}", port));

        let result = self.runner.run(cmd).await?;
        OutputVerifier::stdout(Expectation::Equals(self.messages.created.clone()))
            .verify(&result)
            .map_err(|mismatch| Error::FirewallVerification {
                rule: rule.to_string(),
                action: "creation",
                mismatch,
            })
    }

    async fn remove_rule(&self, rule: &str) -> Result<()> {
        let result = self.runner.run(Self::netsh("delete", rule)).await?;
        OutputVerifier::stdout(Expectation::Equals(self.messages.deleted.clone()))
            .verify(&result)
            .map_err(|mismatch| Error::FirewallVerification {
                rule: rule.to_string(),
                action: "removal",
                mismatch,
            })
    }
}
