//! Network identity rotation between dispatch batches

use async_trait::async_trait;
use tokio::process::Command;

/// Changes the outbound network identity before a batch
///
/// Failures are logged by the implementation and never reported back.
#[async_trait]
pub trait IdentityRotator: Send + Sync {
    async fn rotate(&self);
}

/// Rotator that does nothing
#[derive(Debug, Default)]
pub struct NoopRotator;

#[async_trait]
impl IdentityRotator for NoopRotator {
    async fn rotate(&self) {}
}

/// Runs a shell command to rotate, e.g. a VPN reconnect script
#[derive(Debug, Clone)]
pub struct CommandRotator {
    command: String,
}

impl CommandRotator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl IdentityRotator for CommandRotator {
    async fn rotate(&self) {
        tracing::debug!("Rotating identity: {}", self.command);

        match Command::new("sh").arg("-c").arg(&self.command).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!("Rotate command exited with {}", status),
            Err(e) => tracing::warn!("Failed to run rotate command: {}", e),
        }
    }
}

/// Builds the rotator for an optional configured command
pub fn rotator_for(command: Option<&str>) -> Box<dyn IdentityRotator> {
    match command {
        Some(command) => Box::new(CommandRotator::new(command)),
        None => Box::new(NoopRotator),
    }
}
