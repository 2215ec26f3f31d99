//! Canned decision provider for tests and demos

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::agents::cancel::CancelToken;
use crate::agents::provider::{Decision, DecisionProvider, ProviderError, TurnContext};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Decision),
    /// Reply after a delay, unless cancelled first
    Delayed(Duration, Decision),
    Fail(String),
    /// Never answer; only cancellation ends the request
    Hang,
}

/// Plays back a fixed list of replies, one per request. Once the script runs
/// out every request gets an empty decision.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<TurnContext>>,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn replies(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self::new(decisions.into_iter().map(Step::Reply))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that ended because their token fired
    pub fn cancellations(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Contexts received so far, in request order
    pub fn contexts(&self) -> Vec<TurnContext> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    fn next_step(&self) -> Option<Step> {
        self.script.lock().ok().and_then(|mut script| script.pop_front())
    }

    fn cancelled(&self) -> Result<Decision, ProviderError> {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Cancelled)
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    async fn request_turn(
        &self,
        context: TurnContext,
        cancel: CancelToken,
    ) -> Result<Decision, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(context);
        }

        match self.next_step() {
            None => Ok(Decision::default()),
            Some(Step::Reply(decision)) => Ok(decision),
            Some(Step::Fail(message)) => Err(ProviderError::Failed(message)),
            Some(Step::Delayed(delay, decision)) => {
                tokio::select! {
                    _ = cancel.cancelled() => self.cancelled(),
                    _ = tokio::time::sleep(delay) => Ok(decision),
                }
            }
            Some(Step::Hang) => {
                cancel.cancelled().await;
                self.cancelled()
            }
        }
    }
}
