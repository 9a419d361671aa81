//! Countdown tests.
//!
//! Every async test runs with paused tokio time so `sleep_until` resolves as
//! soon as the runtime is otherwise idle.

use std::time::Duration;

use tokio::time::Instant;
use triviasync_tick::{Countdown, Tick, ONE_SECOND};

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_default_is_idle_one_second() {
    let c = Countdown::default();
    assert_eq!(c.period(), ONE_SECOND);
    assert_eq!(c.remaining(), 0);
    assert!(!c.is_running());
}

#[test]
fn test_zero_period_is_raised() {
    let c = Countdown::new(Duration::ZERO);
    assert_eq!(c.period(), Duration::from_millis(1));
}

// =========================================================================
// Counting down
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_counts_down_once_per_second() {
    let mut c = Countdown::default();
    let started = Instant::now();
    c.start(3);
    assert!(c.is_running());

    assert_eq!(
        c.wait_for_tick().await,
        Tick {
            remaining: 2,
            expired: false
        }
    );
    assert_eq!(c.wait_for_tick().await.remaining, 1);
    let last = c.wait_for_tick().await;
    assert!(last.expired);
    assert_eq!(last.remaining, 0);

    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert!(!c.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_expired_countdown_pends() {
    let mut c = Countdown::default();
    c.start(1);
    assert!(c.wait_for_tick().await.expired);

    let result = tokio::time::timeout(Duration::from_secs(10), c.wait_for_tick()).await;
    assert!(result.is_err(), "expired countdown should pend");
}

#[tokio::test(start_paused = true)]
async fn test_idle_countdown_pends() {
    let mut c = Countdown::default();
    let result = tokio::time::timeout(Duration::from_secs(5), c.wait_for_tick()).await;
    assert!(result.is_err(), "idle countdown should pend");

    c.start(0);
    assert!(!c.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_restart_resets_remaining() {
    let mut c = Countdown::default();
    c.start(30);
    c.wait_for_tick().await;
    c.wait_for_tick().await;
    assert_eq!(c.remaining(), 28);

    c.start(30);
    assert_eq!(c.wait_for_tick().await.remaining, 29);
}

#[tokio::test(start_paused = true)]
async fn test_stop_silences_ticks() {
    let mut c = Countdown::default();
    c.start(30);
    c.wait_for_tick().await;
    c.stop();
    assert_eq!(c.remaining(), 0);

    let result = tokio::time::timeout(Duration::from_secs(5), c.wait_for_tick()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_late_poll_keeps_deadline_schedule() {
    let mut c = Countdown::default();
    let started = Instant::now();
    c.start(3);

    // Nobody polls for 1.5 s; the first tick is overdue, the second is not.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(c.wait_for_tick().await.remaining, 2);
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
    assert_eq!(c.wait_for_tick().await.remaining, 1);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}
