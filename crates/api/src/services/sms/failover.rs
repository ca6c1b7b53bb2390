use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{MessageArg, SmsError, SmsSender};

/// Which sender is active and how many timeouts it has had in a row.
#[derive(Debug, Default, Clone, Copy)]
struct Rotation {
    index: usize,
    timeouts: u32,
}

/// Ring of interchangeable senders. Moves to the next one once the current
/// sender has timed out more than `threshold` times in a row.
///
/// Only timeouts count: any success resets the streak, other errors leave it
/// alone. The lock is never held across a send, so a rotation can happen
/// while sends to the previous sender are in flight; their results are then
/// ignored for rotation purposes.
pub struct FailoverSender {
    senders: Vec<Arc<dyn SmsSender>>,
    threshold: u32,
    send_timeout: Duration,
    rotation: Mutex<Rotation>,
}

impl FailoverSender {
    pub fn new(
        senders: Vec<Arc<dyn SmsSender>>,
        threshold: u32,
        send_timeout: Duration,
    ) -> Result<Self> {
        if senders.is_empty() {
            bail!("failover sender needs at least one sender");
        }
        Ok(Self {
            senders,
            threshold,
            send_timeout,
            rotation: Mutex::new(Rotation::default()),
        })
    }

    /// Index of the sender the next send would use, before any rotation.
    #[cfg(test)]
    fn current_index(&self) -> usize {
        self.rotation().index
    }

    fn rotation(&self) -> MutexGuard<'_, Rotation> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the sender for this send, rotating first if the streak is over
    /// the threshold.
    fn select(&self) -> usize {
        let mut rotation = self.rotation();
        if rotation.timeouts > self.threshold {
            let from = rotation.index;
            rotation.index = (from + 1) % self.senders.len();
            rotation.timeouts = 0;
            tracing::warn!(from, to = rotation.index, "sms sender timing out, failing over");
        }
        rotation.index
    }

    fn record(&self, index: usize, result: &Result<(), SmsError>) {
        let mut rotation = self.rotation();
        if rotation.index != index {
            return;
        }
        match result {
            Ok(()) => rotation.timeouts = 0,
            Err(e) if e.is_timeout() => rotation.timeouts += 1,
            Err(_) => {}
        }
    }
}

#[async_trait]
impl SmsSender for FailoverSender {
    async fn send(
        &self,
        recipient: &str,
        template_id: &str,
        args: &[MessageArg],
    ) -> Result<(), SmsError> {
        let index = self.select();
        let sender = &self.senders[index];

        let result = tokio::time::timeout(
            self.send_timeout,
            sender.send(recipient, template_id, args),
        )
        .await
        .unwrap_or(Err(SmsError::Timeout));

        if let Err(e) = &result {
            tracing::warn!(index, error = %e, "sms send failed");
        }
        self.record(index, &result);
        result
    }
}
