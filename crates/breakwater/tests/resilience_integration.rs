//! End-to-end exercise of the three guards composed around a fake provider.
//!
//! The guards are orthogonal: the breaker gates admission, the limiter paces
//! dispatch, the budgeter bounds the payload. These tests wire all three the
//! way a provider client would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use breakwater::{
    BreakerConfig, BreakerError, ChatMessage, GuardRegistry, MessageBudgeter, State,
};
use tokio::time::{Instant, advance};

/// Fake provider that fails its first `fail_first` calls, then recovers.
struct Provider {
    calls: AtomicUsize,
    fail_first: usize,
}

impl Provider {
    fn new(fail_first: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn complete(&self, history: &[ChatMessage]) -> Result<String, std::io::Error> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            Err(std::io::Error::other("upstream unavailable"))
        } else {
            Ok(format!("ok:{}", history.len()))
        }
    }
}

fn long_conversation() -> Vec<ChatMessage> {
    (0..100)
        .map(|i| ChatMessage::user(format!("turn {i}: {}", "x".repeat(200))))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_breaker_guards_flaky_provider() {
    let registry = GuardRegistry::default();
    registry
        .register_breaker("provider", BreakerConfig::new(3, Duration::from_secs(60)))
        .unwrap();
    let breaker = registry.breaker("provider");
    let provider = Provider::new(3);
    let history = vec![ChatMessage::user("hello")];

    for _ in 0..3 {
        let result = breaker.call(provider.complete(&history)).await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(provider.calls(), 3);

    // rejected without reaching the provider
    let err = breaker.call(provider.complete(&history)).await.unwrap_err();
    assert!(err.is_open());
    assert_eq!(provider.calls(), 3);

    advance(Duration::from_secs(61)).await;
    let response = breaker.call(provider.complete(&history)).await.unwrap();
    assert_eq!(response, "ok:1");
    assert_eq!(breaker.state(), State::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_limiter_paces_guarded_calls() {
    let registry = GuardRegistry::default();
    registry.register_limiter("provider", 60.0).unwrap();
    let limiter = registry.limiter("provider");
    let breaker = registry.breaker("provider");
    let provider = Provider::new(0);
    let history = vec![ChatMessage::user("hi")];

    let start = Instant::now();
    for _ in 0..5 {
        limiter.wait_for_token().await;
        breaker.call(provider.complete(&history)).await.unwrap();
    }

    // 60 rpm means five back-to-back calls take at least ~4 seconds
    assert!(Instant::now() - start >= Duration::from_secs(4));
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn test_budgeter_bounds_payload_before_dispatch() {
    let registry = GuardRegistry::default();
    let budgeter = MessageBudgeter::new();
    let conversation = long_conversation();
    let provider = Provider::new(0);

    let budget = 500;
    let trimmed = budgeter.truncate(&conversation, budget);
    assert!(budgeter.total_tokens(&trimmed) <= budget);
    assert!(!trimmed.is_empty());
    assert!(trimmed.len() < conversation.len());
    // the most recent turn always survives
    assert_eq!(trimmed.last(), conversation.last());

    let response = registry
        .breaker("provider")
        .call(provider.complete(&trimmed))
        .await
        .unwrap();
    assert_eq!(response, format!("ok:{}", trimmed.len()));
}

#[tokio::test(start_paused = true)]
async fn test_full_call_path_recovers_after_outage() {
    let registry = GuardRegistry::default();
    registry
        .register_breaker("provider", BreakerConfig::new(2, Duration::from_secs(30)))
        .unwrap();
    registry.register_limiter("provider", 120.0).unwrap();
    let breaker = registry.breaker("provider");
    let limiter = registry.limiter("provider");
    let budgeter = MessageBudgeter::new();
    let provider = Provider::new(2);
    let conversation = long_conversation();

    let mut responses = Vec::new();
    for _ in 0..6 {
        limiter.wait_for_token().await;
        let payload = budgeter.truncate(&conversation, 100);
        match breaker.call(provider.complete(&payload)).await {
            Ok(response) => responses.push(response),
            Err(BreakerError::Open(open)) => {
                // back off exactly as long as the breaker asks
                advance(open.retry_after).await;
            }
            Err(BreakerError::Operation(_)) => {}
        }
    }

    // two failures trip the breaker, one attempt is rejected mid-cooldown,
    // the probe and the remaining calls succeed
    assert_eq!(responses.len(), 3);
    assert_eq!(provider.calls(), 5);
    assert_eq!(breaker.state(), State::Closed);
}
