//! Mock publisher for testing
//!
//! Configurable to succeed, succeed with a warning, or fail, optionally after
//! a delay. Every call is recorded so tests can assert how many publishes
//! actually reached the adapter layer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::Publisher;
use crate::types::{Account, AccountId, PlatformKind, PostContent, PublishResult, Published};

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Succeed,
    /// Primary content published, auxiliary step failed
    SucceedWithWarning(String),
    Fail(PlatformError),
}

/// One recorded publish call
#[derive(Debug, Clone)]
pub struct MockCall {
    pub account: AccountId,
    pub content: PostContent,
}

pub struct MockPublisher {
    kind: PlatformKind,
    outcome: MockOutcome,
    delay: Duration,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockPublisher {
    pub fn new(kind: PlatformKind, outcome: MockOutcome) -> Self {
        Self {
            kind,
            outcome,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn success(kind: PlatformKind) -> Self {
        Self::new(kind, MockOutcome::Succeed)
    }

    pub fn failure(kind: PlatformKind, error: PlatformError) -> Self {
        Self::new(kind, MockOutcome::Fail(error))
    }

    pub fn with_warning(kind: PlatformKind, warning: &str) -> Self {
        Self::new(kind, MockOutcome::SucceedWithWarning(warning.to_string()))
    }

    /// Simulate network latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    async fn publish(&self, account: &Account, content: &PostContent) -> PublishResult {
        let n = {
            let mut calls = self.lock();
            calls.push(MockCall {
                account: account.id.clone(),
                content: content.clone(),
            });
            calls.len()
        };

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let published = |warning: Option<String>| Published {
            post_id: n.to_string(),
            url: format!("https://mock.example/{}/{}", self.kind, n),
            warning,
        };

        match &self.outcome {
            MockOutcome::Succeed => Ok(published(None)),
            MockOutcome::SucceedWithWarning(w) => Ok(published(Some(w.clone()))),
            MockOutcome::Fail(e) => Err(e.clone()),
        }
    }
}
