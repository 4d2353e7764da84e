#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use throttle_core::{ResetEvent, SetupEvent, ThrottleEvent, ThrottleObserver};
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub setups: AtomicUsize,
    pub remaining: Mutex<Vec<u32>>,
    pub drained: Mutex<Vec<usize>>,
}

impl RecordingObserver {
    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> Vec<u32> {
        self.remaining.lock().unwrap().clone()
    }

    pub fn drained(&self) -> Vec<usize> {
        self.drained.lock().unwrap().clone()
    }
}

impl ThrottleObserver for RecordingObserver {
    fn on_setup(&self, _event: &SetupEvent<'_>) {
        self.setups.fetch_add(1, Ordering::SeqCst);
    }

    fn on_throttle(&self, event: &ThrottleEvent<'_>) {
        self.remaining.lock().unwrap().push(event.remaining);
    }

    fn on_reset(&self, event: &ResetEvent<'_>) {
        self.drained.lock().unwrap().push(event.drained);
    }
}

/// Tracks hits the way a fixed-window remote endpoint would count quota.
#[derive(Debug)]
pub struct HitTracker {
    pub first_hit: Option<Instant>,
    pub window_size: Duration,
    pub current_window: u128,
    pub quota_remaining: i64,
    pub quota: i64,
}

impl HitTracker {
    pub fn new(quota: u32, window_size: Duration) -> Self {
        Self {
            first_hit: None,
            window_size,
            current_window: 0,
            quota_remaining: quota as i64,
            quota: quota as i64,
        }
    }

    pub fn hit(&mut self) {
        let first = *self.first_hit.get_or_insert_with(Instant::now);
        let window = first.elapsed().as_nanos() / self.window_size.as_nanos();
        if window != self.current_window {
            self.quota_remaining = self.quota;
            self.current_window = window;
        }
        self.quota_remaining -= 1;
    }
}
