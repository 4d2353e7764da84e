use crate::limiter::Engine;
use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) async fn refill(engine: Arc<Engine>, shutdown: CancellationToken) {
    let rate = engine.window.rate();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            added = engine.bucket.put() => {
                if added.is_err() {
                    break;
                }
            }
        }
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = time::sleep(rate) => {}
        }
    }
    engine.bucket.close();
    debug!(limiter = %engine.name, "refill stopped");
}

pub(crate) async fn reset(engine: Arc<Engine>, shutdown: CancellationToken) {
    let window = engine.window.window();
    let Some(first) = engine.origin.checked_add(window) else {
        // Window lies past the end of representable time; nothing to reset.
        shutdown.cancelled().await;
        return;
    };
    let mut ticker = time::interval_at(first, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let drained = engine.bucket.drain();
        engine.restart_window(drained);
    }
    debug!(limiter = %engine.name, "window reset stopped");
}
