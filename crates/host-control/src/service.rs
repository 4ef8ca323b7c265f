//! OS service verbs

use crate::error::{Error, Result};
use crate::messages::ServiceMessages;
use async_trait::async_trait;
use command_executor::{Command, CommandResult, CommandRunner, Expectation, OutputVerifier};
use std::sync::Arc;
use tracing::{debug, info};

/// Control over services registered with the OS service manager
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Whether a service with this name is registered
    async fn exists(&self, service: &str) -> Result<bool>;

    /// Whether the service is running
    async fn is_running(&self, service: &str) -> Result<bool>;

    /// Whether the service is stopped
    async fn is_stopped(&self, service: &str) -> Result<bool>;

    /// Start the service, failing unless the manager confirms it started
    async fn start(&self, service: &str) -> Result<()>;

    /// Stop the service, failing unless the manager confirms it stopped
    async fn stop(&self, service: &str) -> Result<()>;

    /// Stop the service if it is running, then start it.
    ///
    /// A stopped service is only started, so the stop verb is never issued
    /// against a service that would reject it.
    async fn restart(&self, service: &str) -> Result<()> {
        if self.is_running(service).await? {
            self.stop(service).await?;
        }
        self.start(service).await
    }

    /// Start the service unless it already runs; returns whether it was started
    async fn start_if_not_running(&self, service: &str) -> Result<bool> {
        if self.is_running(service).await? {
            info!("Service already running: {}", service);
            Ok(false)
        } else {
            info!("Starting service: {}", service);
            self.start(service).await?;
            Ok(true)
        }
    }
}

/// Windows service control through `sc query` and `net start|stop`
pub struct WindowsServices {
    runner: Arc<dyn CommandRunner>,
    messages: ServiceMessages,
}

impl WindowsServices {
    /// Create a controller using the default English wording
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_messages(runner, ServiceMessages::default())
    }

    /// Create a controller with custom wording
    pub fn with_messages(runner: Arc<dyn CommandRunner>, messages: ServiceMessages) -> Self {
        Self { runner, messages }
    }

    async fn query(&self, service: &str) -> Result<CommandResult> {
        let cmd = Command::builder("sc").arg("query").arg(service).build();
        Ok(self.runner.run(cmd).await?)
    }

    /// Query the state, failing if the manager does not know the service
    async fn query_known(&self, service: &str) -> Result<CommandResult> {
        let result = self.query(service).await?;
        if !result.out().contains(service) {
            return Err(Error::ServiceUnavailable {
                service: service.to_string(),
                result,
            });
        }
        Ok(result)
    }

    async fn net(&self, verb: &'static str, service: &str, expected: String) -> Result<()> {
        let cmd = Command::builder("net").arg(verb).arg(service).build();
        let result = self.runner.run(cmd).await?;
        OutputVerifier::stdout(Expectation::EndsWith(expected))
            .verify(&result)
            .map_err(|mismatch| Error::ServiceVerification {
                service: service.to_string(),
                action: verb,
                mismatch,
            })
    }
}

#[async_trait]
impl ServiceControl for WindowsServices {
    async fn exists(&self, service: &str) -> Result<bool> {
        let result = self.query(service).await?;
        let exists = result.out().contains(service);
        debug!("Service {} exists: {}", service, exists);
        Ok(exists)
    }

    async fn is_running(&self, service: &str) -> Result<bool> {
        let result = self.query_known(service).await?;
        Ok(result.out().contains(self.messages.running_state.as_str()))
    }

    async fn is_stopped(&self, service: &str) -> Result<bool> {
        let result = self.query_known(service).await?;
        Ok(result.out().contains(self.messages.stopped_state.as_str()))
    }

    async fn start(&self, service: &str) -> Result<()> {
        self.net("start", service, self.messages.started_for(service))
            .await
    }

    async fn stop(&self, service: &str) -> Result<()> {
        self.net("stop", service, self.messages.stopped_for(service))
            .await
    }
}
