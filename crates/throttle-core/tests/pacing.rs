mod common;

use common::{HitTracker, RecordingObserver};
use std::sync::Arc;
use std::time::Duration;
use throttle_core::{NoopObserver, RateLimiter, RateWindow};
use tokio::time::{sleep, Instant};

const QUOTA: u32 = 10;
const RATE: Duration = Duration::from_millis(50);
const JITTER: Duration = Duration::from_millis(60);

fn init(quota: u32, rate: Duration) -> (RateLimiter, HitTracker) {
    let window = RateWindow::new(quota, rate).unwrap();
    let limiter = RateLimiter::builder(window)
        .name("pacing")
        .observer(Arc::new(NoopObserver))
        .build();
    (limiter, HitTracker::new(quota, window.window()))
}

/// Never waits much longer than one refill and never overshoots the tracker.
async fn check_hit(limiter: &RateLimiter, tracker: &mut HitTracker) {
    let start = Instant::now();
    limiter.throttle().await.unwrap();
    let handle = limiter.throttle_handle();
    assert!(handle.available() <= QUOTA as usize);
    tracker.hit();

    let waited = start.elapsed();
    assert!(
        waited <= limiter.rate_window().rate() + JITTER,
        "waited {waited:?}"
    );
    assert!(
        tracker.quota_remaining >= 0,
        "hits over quota: remaining {} in window {}",
        tracker.quota_remaining,
        tracker.current_window
    );
}

#[tokio::test(start_paused = true)]
async fn continuous_calls_pace_at_rate() {
    let (limiter, mut tracker) = init(QUOTA, RATE);
    let start = Instant::now();
    for _ in 0..QUOTA * 2 {
        check_hit(&limiter, &mut tracker).await;
    }
    assert!(start.elapsed() >= RATE * QUOTA);
}

#[tokio::test(start_paused = true)]
async fn tokens_accumulate_during_gap() {
    let (limiter, mut tracker) = init(QUOTA, RATE);
    check_hit(&limiter, &mut tracker).await;

    sleep(RATE * (QUOTA / 2)).await;
    let start = Instant::now();
    for _ in 0..QUOTA / 2 {
        check_hit(&limiter, &mut tracker).await;
    }
    assert!(start.elapsed() < RATE, "burst took {:?}", start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn repeated_gaps_stay_within_quota() {
    let (limiter, mut tracker) = init(QUOTA, RATE);
    check_hit(&limiter, &mut tracker).await;
    for _ in 0..2 {
        sleep(RATE * (QUOTA / 2)).await;
        for _ in 0..QUOTA / 2 {
            check_hit(&limiter, &mut tracker).await;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn pacing_resumes_after_window_ends() {
    let (limiter, mut tracker) = init(QUOTA, RATE);
    check_hit(&limiter, &mut tracker).await;
    sleep(RATE * (QUOTA - 1)).await;
    for _ in 0..QUOTA * 2 {
        check_hit(&limiter, &mut tracker).await;
    }
    assert!(tracker.current_window >= 1);
}

#[tokio::test(start_paused = true)]
async fn refill_never_faster_than_rate() {
    let window = RateWindow::new(5, RATE).unwrap().with_window(Duration::ZERO);
    let limiter = RateLimiter::builder(window)
        .observer(Arc::new(NoopObserver))
        .build();

    let mut stamps = Vec::new();
    for _ in 0..5 {
        limiter.throttle().await.unwrap();
        stamps.push(Instant::now());
    }
    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= RATE);
    }
}

#[tokio::test(start_paused = true)]
async fn occupancy_capped_at_quota_without_reset() {
    let window = RateWindow::new(3, Duration::from_millis(1))
        .unwrap()
        .with_window(Duration::ZERO);
    let limiter = RateLimiter::builder(window)
        .observer(Arc::new(NoopObserver))
        .build();

    assert_eq!(limiter.tokens_left(), 0);
    for _ in 0..10 {
        sleep(Duration::from_millis(7)).await;
        assert!(limiter.tokens_left() <= 3);
    }
    assert_eq!(limiter.tokens_left(), 3);
}

#[tokio::test(start_paused = true)]
async fn reset_discards_unused_tokens() {
    let observer = Arc::new(RecordingObserver::default());
    let window = RateWindow::new(5, Duration::from_millis(10))
        .unwrap()
        .with_window(Duration::from_millis(200));
    let limiter = RateLimiter::builder(window)
        .observer(observer.clone())
        .build();

    limiter.tokens_left();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(limiter.tokens_left(), 5);

    sleep(Duration::from_millis(55)).await;
    assert!(limiter.tokens_left() <= 1, "left {}", limiter.tokens_left());
    assert_eq!(observer.drained().first(), Some(&5));
}

#[tokio::test(start_paused = true)]
async fn reset_restarts_usage_window() {
    let (limiter, _) = init(5, Duration::from_millis(10));
    limiter.throttle().await.unwrap();
    limiter.throttle().await.unwrap();
    let usage = limiter.usage().unwrap();
    assert_eq!(usage.used, 2);
    assert_eq!(usage.remaining, 3);

    sleep(Duration::from_millis(45)).await;
    let usage = limiter.usage().unwrap();
    assert_eq!(usage.used, 0);
    assert_eq!(usage.remaining, 5);
}
