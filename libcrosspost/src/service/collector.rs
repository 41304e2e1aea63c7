//! Single-shot, timeout-bounded input collection
//!
//! Each call optionally shows a prompt, waits for one message from the
//! initiating user in the scope's channel, hands it to `read` while the
//! message still exists (attachment URLs expire once it is gone), then
//! deletes both the message and the prompt. Cleanup failures are logged and
//! never replace the collected value.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{
    ArtifactContent, ArtifactHandle, Collected, InputScope, Transport, UserInput,
};

/// Delete an artifact, logging instead of failing
pub(crate) async fn discard(transport: &dyn Transport, handle: &ArtifactHandle, what: &str) {
    if let Err(e) = transport.delete_artifact(handle).await {
        tracing::warn!(artifact = %handle.id, error = %e, "Failed to clean up {}", what);
    }
}

pub async fn collect<T, F, Fut>(
    transport: &dyn Transport,
    scope: &InputScope,
    prompt: Option<&ArtifactContent>,
    timeout: Duration,
    read: F,
) -> Result<Collected<T>, TransportError>
where
    F: FnOnce(UserInput) -> Fut,
    Fut: Future<Output = T>,
{
    let prompt = match prompt {
        Some(content) => Some(transport.send_artifact(&scope.channel, content, &[]).await?.handle),
        None => None,
    };

    let waited = tokio::time::timeout(timeout, transport.await_user_input(scope, timeout))
        .await
        .unwrap_or(Ok(Collected::Timeout));

    let outcome = match waited {
        Ok(Collected::Input(input)) => {
            let handle = input.handle.clone();
            let value = read(input).await;
            discard(transport, &handle, "user input").await;
            Ok(Collected::Input(value))
        }
        Ok(Collected::Timeout) => {
            tracing::debug!(channel = %scope.channel, user = %scope.user_id, "Collector timed out");
            Ok(Collected::Timeout)
        }
        Err(e) => Err(e),
    };

    if let Some(handle) = &prompt {
        discard(transport, handle, "prompt").await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryTransport, TransportOp};
    use crate::transport::DestinationId;
    use std::time::Instant;

    fn scope() -> InputScope {
        InputScope::new("100", "42")
    }

    #[tokio::test]
    async fn test_timeout_within_budget() {
        let transport = MemoryTransport::new();
        let prompt = ArtifactContent::plain("Reply with a number");

        let started = Instant::now();
        let window = Duration::from_millis(100);
        let outcome = collect(&transport, &scope(), Some(&prompt), window, |i| async move { i })
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(outcome.is_timeout());
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2));
        assert!(transport.artifacts_in(&DestinationId::from("100")).is_empty());
    }

    #[tokio::test]
    async fn test_reads_before_deleting_input_and_prompt() {
        let transport = MemoryTransport::new();
        let input = transport.push_input(&scope(), "2", Vec::new());
        let prompt = ArtifactContent::plain("Pick one");

        let outcome = collect(&transport, &scope(), Some(&prompt), Duration::from_secs(1), |i| {
            let still_there = transport.artifact(&i.handle).is_some();
            async move { (i.content, still_there) }
        })
        .await
        .unwrap();

        assert_eq!(outcome, Collected::Input(("2".to_string(), true)));
        assert!(transport.artifact(&input).is_none());
        assert!(transport.artifacts_in(&DestinationId::from("100")).is_empty());
    }

    #[tokio::test]
    async fn test_only_initiating_user_is_heard() {
        let transport = MemoryTransport::new();
        transport.push_input(&InputScope::new("100", "7"), "1", Vec::new());

        let window = Duration::from_millis(50);
        let outcome = collect(&transport, &scope(), None, window, |i| async move { i })
            .await
            .unwrap();
        assert!(outcome.is_timeout());
        assert_eq!(transport.pending_inputs(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_mask_value() {
        let transport = MemoryTransport::new();
        transport.push_input(&scope(), "hello", Vec::new());
        transport.fail(TransportOp::Delete);

        let prompt = ArtifactContent::plain("Type");
        let window = Duration::from_secs(1);
        let outcome = collect(&transport, &scope(), Some(&prompt), window, |i| async move {
            i.content
        })
        .await
        .unwrap();
        assert_eq!(outcome, Collected::Input("hello".to_string()));
    }

    #[tokio::test]
    async fn test_prompt_send_failure_propagates() {
        let transport = MemoryTransport::new();
        transport.fail(TransportOp::Send);

        let prompt = ArtifactContent::plain("Type");
        let window = Duration::from_millis(10);
        let result =
            collect(&transport, &scope(), Some(&prompt), window, |i| async move { i }).await;
        assert!(result.is_err());
    }
}
