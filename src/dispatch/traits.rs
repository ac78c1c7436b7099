use async_trait::async_trait;

use super::client::DispatchError;
use super::command::EnforcementCommand;

/// Seam between the rule service and the enforcement point transport.
///
/// The real implementation opens one TCP connection per command; tests
/// substitute a recording mock.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Send one command and return the normalized reply.
    ///
    /// Success means the connection completed without error; the reply
    /// content is advisory, not a contract.
    async fn send(&self, command: &EnforcementCommand)
        -> Result<serde_json::Value, DispatchError>;
}
