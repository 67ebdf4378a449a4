//! Driving service prompts to completion.
//!
//! Some operations cannot finish until the user confirms them. The service
//! then hands back a prompt object instead of a result. Running it means
//! subscribing to its `Completed` signal, calling `Prompt`, and waiting for
//! the signal. The signal says whether the user dismissed the prompt and, if
//! not, carries the operation's real result.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bridge::cancellable;
use crate::bus::{interfaces, take_args, Bus, ObjectPath, SignalGuard, Value};
use crate::error::{Result, SecretError};

/// Where a prompt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// Returned by the service, not yet shown.
    Issued,
    /// Shown; waiting for the completion signal.
    AwaitingCompletion,
    /// Finished, one way or another.
    Completed,
}

/// How a prompt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome {
    /// The user declined.
    Dismissed,
    /// The user confirmed; the operation's result.
    Value(Value),
}

/// A prompt returned by the service.
pub struct Prompt {
    bus: Arc<dyn Bus>,
    destination: String,
    path: ObjectPath,
    state: PromptState,
}

impl Prompt {
    pub fn new(bus: Arc<dyn Bus>, destination: impl Into<String>, path: ObjectPath) -> Self {
        Self {
            bus,
            destination: destination.into(),
            path,
            state: PromptState::Issued,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Show the prompt and wait for the user.
    ///
    /// If `cancel` fires first, the prompt is dismissed on the service and
    /// [`SecretError::Cancelled`] is returned. The signal subscription is
    /// released on every path out of this function.
    pub async fn run(&mut self, window_id: &str, cancel: &CancellationToken) -> Result<PromptOutcome> {
        if self.state != PromptState::Issued {
            return Err(SecretError::Usage(format!("prompt {} already ran", self.path)));
        }

        let mut completed = SignalGuard::subscribe(
            self.bus.clone(),
            &self.destination,
            &self.path,
            interfaces::PROMPT,
            "Completed",
        )?;

        debug!(path = %self.path, window_id, "showing prompt");
        let shown = cancellable(
            cancel,
            self.bus.call(
                &self.destination,
                &self.path,
                interfaces::PROMPT,
                "Prompt",
                vec![Value::Str(window_id.to_string())],
            ),
        )
        .await;
        match shown {
            Ok(reply) => {
                reply?;
            }
            Err(err) => {
                self.dismiss().await;
                return Err(err);
            }
        }
        self.state = PromptState::AwaitingCompletion;

        let signal = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.dismiss().await;
                return Err(SecretError::Cancelled);
            }
            signal = completed.next() => signal,
        };
        drop(completed);
        self.state = PromptState::Completed;

        let body = signal.ok_or_else(|| {
            SecretError::Transport(format!("completion stream for prompt {} closed", self.path))
        })?;
        let [dismissed, result] = take_args::<2>(body)?;

        if dismissed.into_bool()? {
            debug!(path = %self.path, "prompt dismissed");
            Ok(PromptOutcome::Dismissed)
        } else {
            debug!(path = %self.path, "prompt completed");
            Ok(PromptOutcome::Value(result.into_inner()))
        }
    }

    async fn dismiss(&mut self) {
        self.state = PromptState::Completed;
        let dismissed = self
            .bus
            .call(&self.destination, &self.path, interfaces::PROMPT, "Dismiss", vec![])
            .await;
        match dismissed {
            Ok(_) => debug!(path = %self.path, "prompt dismissed after cancellation"),
            Err(err) => warn!(path = %self.path, error = %err, "failed to dismiss prompt"),
        }
    }
}

/// Run the prompt at `path`, if there is one.
///
/// `/` means the operation needed no confirmation; that yields `Ok(None)`
/// without touching the bus.
pub(crate) async fn run_optional(
    bus: &Arc<dyn Bus>,
    destination: &str,
    path: ObjectPath,
    window_id: &str,
    cancel: &CancellationToken,
) -> Result<Option<PromptOutcome>> {
    if path.is_none() {
        return Ok(None);
    }
    let mut prompt = Prompt::new(bus.clone(), destination, path);
    prompt.run(window_id, cancel).await.map(Some)
}
