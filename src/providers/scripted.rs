// Scripted provider: replays canned replies in order
//
// Used by the test suites and by `ideaforge run --dry-run`. Every request is
// recorded so callers can assert on what the controller actually sent.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::types::ProviderRequest;
use super::LlmProvider;

/// One queued outcome
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(String),
}

/// In-memory provider that answers from a fixed script
///
/// Replies are consumed front to back. Once the script is exhausted every
/// further call fails, which surfaces as a provider error in the controller.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of successful replies
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for reply in replies {
            provider.push_text(reply);
        }
        provider
    }

    /// Wait this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_text(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(ScriptedReply::Text(reply.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.lock_replies()
            .push_back(ScriptedReply::Error(message.into()));
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn remaining(&self) -> usize {
        self.lock_replies().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptedReply>> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn invoke(&self, request: &ProviderRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.lock_replies().pop_front();
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(message)) => Err(anyhow::anyhow!(message)),
            None => anyhow::bail!("Scripted provider has no replies left"),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}
