//! Admission control and handle lifetime tests

mod common;

use common::{RecordingTransport, StubExtractor, create_fetcher, create_fetcher_with};
use media_fetch::config::{HandleConfig, RateLimitConfig};
use media_fetch::handles::HandleRegistry;
use media_fetch::rate_limit::RateLimiter;
use media_fetch::{Error, MediaKind, RequesterId, UserFacing};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

const U1: RequesterId = RequesterId(1);

#[tokio::test]
async fn sixth_link_in_a_burst_is_rejected() {
    let (fetcher, _temp_dir) = create_fetcher(Arc::new(StubExtractor::always_succeeding())).await;

    for i in 0..5 {
        fetcher
            .submit(U1, &format!("https://youtube.com/watch?v={i}"))
            .await
            .unwrap();
    }

    let err = fetcher
        .submit(U1, "https://youtube.com/watch?v=6")
        .await
        .unwrap_err();
    match &err {
        Error::AdmissionDenied { retry_after } => {
            assert!(*retry_after > Duration::ZERO);
            assert!(*retry_after <= Duration::from_secs(300));
        }
        other => panic!("expected AdmissionDenied, got {other:?}"),
    }
    assert!(err.user_message().starts_with("Too many requests."));
    assert_eq!(fetcher.pending_handles().await, 5);

    // Other requesters are unaffected
    fetcher
        .submit(RequesterId(2), "https://youtube.com/watch?v=x")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_links_do_not_use_up_the_quota() {
    let (fetcher, _temp_dir) = create_fetcher_with(
        Arc::new(StubExtractor::always_succeeding()),
        |config| config.rate_limit.max_requests = 2,
    )
    .await;
    let transport = RecordingTransport::default();

    for _ in 0..5 {
        assert!(
            fetcher
                .handle_message(U1, "https://example.com/video", &transport)
                .await
                .is_none()
        );
    }
    assert!(
        transport
            .messages()
            .iter()
            .all(|(_, text)| text.starts_with("Sorry, this link is not supported."))
    );

    for _ in 0..2 {
        fetcher
            .submit(U1, "https://vimeo.com/12345")
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn expired_handle_cannot_be_dispatched() {
    let (fetcher, _temp_dir) = create_fetcher_with(
        Arc::new(StubExtractor::always_succeeding()),
        |config| config.handles.ttl = Duration::from_millis(20),
    )
    .await;
    let transport = RecordingTransport::default();

    let submission = fetcher
        .submit(U1, "https://soundcloud.com/artist/track")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let err = fetcher
        .dispatch(U1, &submission.token, MediaKind::Audio, &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HandleExpired));
    assert_eq!(
        err.user_message(),
        "This link has expired. Please send it again."
    );
    assert_eq!(fetcher.pending_handles().await, 0);
}

/// Admissions inside any window never exceed the quota, and an admission is
/// refused only when the window really is full.
#[tokio::test]
async fn sliding_window_matches_a_reference_count() {
    let config = RateLimitConfig {
        max_requests: 5,
        window: Duration::from_secs(300),
    };
    let limiter = RateLimiter::new(config.clone());
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let start = Instant::now();
    let mut offset = Duration::ZERO;
    let mut admitted: Vec<Duration> = Vec::new();

    for _ in 0..2_000 {
        // Mostly bursts, sometimes long idle gaps
        let step = if rng.gen_bool(0.1) {
            rng.gen_range(0..600_000)
        } else {
            rng.gen_range(0..20_000)
        };
        offset += Duration::from_millis(step);

        let in_window = admitted
            .iter()
            .filter(|&&t| offset - t < config.window)
            .count();

        match limiter.check(U1, start + offset).await {
            None => {
                assert!(in_window < 5, "admitted with {in_window} already in window");
                admitted.push(offset);
            }
            Some(retry_after) => {
                assert_eq!(in_window, 5, "rejected with only {in_window} in window");
                assert!(retry_after <= config.window);
                let oldest = admitted
                    .iter()
                    .copied()
                    .filter(|&t| offset - t < config.window)
                    .min()
                    .unwrap();
                assert_eq!(retry_after, config.window - (offset - oldest));
            }
        }
    }

    assert!(admitted.len() > 5, "the timeline should exercise refills");
}

#[tokio::test]
async fn handles_resolve_until_consumed() {
    let registry = HandleRegistry::new(HandleConfig::default());
    let now = Instant::now();
    let mut rng = StdRng::seed_from_u64(42);

    let mut issued = Vec::new();
    for i in 0..50 {
        let url = format!("https://youtube.com/watch?v={i}");
        let requester = RequesterId(rng.gen_range(1..5));
        let token = registry.issue(&url, requester, now).await;
        issued.push((token, url, requester));
    }
    assert_eq!(registry.len().await, 50);

    for (token, url, requester) in &issued {
        let (resolved_url, owner) = registry.resolve(token, now).await.unwrap();
        assert_eq!(&resolved_url, url);
        assert_eq!(owner, *requester);
    }

    for (token, _, _) in issued.iter().step_by(2) {
        assert!(registry.consume(token).await.is_some());
    }

    for (i, (token, url, _)) in issued.iter().enumerate() {
        let resolved = registry.resolve(token, now).await;
        if i % 2 == 0 {
            assert!(matches!(resolved, Err(Error::HandleNotFound)));
        } else {
            assert_eq!(&resolved.unwrap().0, url);
        }
    }
}
