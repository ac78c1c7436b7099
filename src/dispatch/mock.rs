use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::DispatchError;
use super::command::EnforcementCommand;
use super::traits::Dispatch;

/// Recording dispatcher for tests.
#[derive(Debug, Default)]
pub struct MockDispatcher {
    sent: Mutex<Vec<EnforcementCommand>>,
    fail: Mutex<bool>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with a connection-refused error.
    pub fn fail_all(&self) {
        *self.fail.lock() = true;
    }

    /// Commands sent so far (for assertions).
    pub fn sent_commands(&self) -> Vec<EnforcementCommand> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Dispatch for MockDispatcher {
    async fn send(
        &self,
        command: &EnforcementCommand,
    ) -> Result<serde_json::Value, DispatchError> {
        self.sent.lock().push(command.clone());

        if *self.fail.lock() {
            return Err(DispatchError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock dispatcher failure",
            )));
        }

        Ok(serde_json::json!({ "status": "ok" }))
    }
}
