use crate::error::ThrottleError;
use tokio::sync::{Semaphore, TryAcquireError};

/// `tokens` counts what can be taken, `slots` counts free capacity. Every
/// token added holds a slot, so occupancy never exceeds the capacity.
#[derive(Debug)]
pub struct Bucket {
    capacity: usize,
    tokens: Semaphore,
    slots: Semaphore,
}

impl Bucket {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tokens: Semaphore::new(0),
            slots: Semaphore::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Waits while the bucket is full. Cancel safe.
    pub async fn put(&self) -> Result<(), ThrottleError> {
        self.slots
            .acquire()
            .await
            .map_err(|_| ThrottleError::Closed)?
            .forget();
        self.tokens.add_permits(1);
        Ok(())
    }

    pub fn try_put(&self) -> bool {
        match self.slots.try_acquire() {
            Ok(slot) => {
                slot.forget();
                self.tokens.add_permits(1);
                true
            }
            Err(_) => false,
        }
    }

    /// Cancel safe: a dropped future consumes no token.
    pub async fn take(&self) -> Result<(), ThrottleError> {
        self.tokens
            .acquire()
            .await
            .map_err(|_| ThrottleError::Closed)?
            .forget();
        self.slots.add_permits(1);
        Ok(())
    }

    pub fn try_take(&self) -> bool {
        match self.tokens.try_acquire() {
            Ok(token) => {
                token.forget();
                self.slots.add_permits(1);
                true
            }
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => false,
        }
    }

    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while self.try_take() {
            drained += 1;
        }
        drained
    }

    pub fn close(&self) {
        self.tokens.close();
        self.slots.close();
    }
}
