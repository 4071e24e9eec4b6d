use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::{Action, ActionStatus};
use crate::{CloudApi, Error, Result, poll};

/// Suppresses repeated observations of the same progress value.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    /// Returns `true` the first time a given value is seen in a row.
    pub fn observe(&mut self, progress: u8) -> bool {
        if self.last == Some(progress) {
            return false;
        }
        self.last = Some(progress);
        true
    }
}

/// Polls provider actions until they reach a terminal state.
#[derive(Clone)]
pub struct ActionWaiter {
    api: Arc<dyn CloudApi>,
    interval: Duration,
    cancel: CancellationToken,
}

impl ActionWaiter {
    pub fn new(api: Arc<dyn CloudApi>, interval: Duration, cancel: CancellationToken) -> Self {
        Self { api, interval, cancel }
    }

    pub async fn wait(&self, action: &Action) -> Result<Action> {
        self.wait_with(action, |current| {
            debug!(
                action_id = current.id,
                command = %current.command,
                progress = current.progress,
                "action progress"
            );
        })
        .await
    }

    /// Like `wait`, invoking `on_progress` once per distinct progress value.
    pub async fn wait_with<F>(&self, action: &Action, mut on_progress: F) -> Result<Action>
    where
        F: FnMut(&Action) + Send,
    {
        let mut tracker = ProgressTracker::default();
        let mut current = action.clone();
        loop {
            if tracker.observe(current.progress) {
                on_progress(&current);
            }
            match current.status {
                ActionStatus::Success => return Ok(current),
                ActionStatus::Error => return Err(action_failed(&current)),
                ActionStatus::Running => {}
            }
            poll::sleep(self.interval, &self.cancel).await?;
            current = self.api.action(current.id).await?;
        }
    }

    /// Wait for each action in order, stopping at the first failure.
    pub async fn wait_all(&self, label: &str, actions: &[Action]) -> Result<()> {
        for action in actions {
            self.wait(action).await.map_err(|error| Error::Batch {
                label: label.to_string(),
                error: Box::new(error),
            })?;
        }
        Ok(())
    }
}

fn action_failed(action: &Action) -> Error {
    let (code, message) = match &action.error {
        Some(e) => (e.code.clone(), e.message.clone()),
        None => ("unknown".to_string(), "action failed without details".to_string()),
    };
    Error::ActionFailed {
        id: action.id,
        command: action.command.clone(),
        code,
        message,
    }
}
