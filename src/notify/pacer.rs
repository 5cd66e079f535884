// Per-chat send pacing for outbound notifications.
//
// Chat services throttle a bot that posts to one chat in bursts (roughly one
// message per second). Each caller books the next free slot on the schedule
// and then waits for it, so the first message goes out at once and every later
// one lands at least `gap` after the previous booking.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Clone)]
pub struct Pacer {
    gap: Duration,
    /// Earliest instant the next message may go out; `None` before the first.
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl Pacer {
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Book the next slot for this chat and wait until it arrives.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |at| at.max(now));
            *next = Some(slot + self.gap);
            slot
        };
        // Bookings are made under the lock; the wait itself is not.
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_send_is_immediate() {
        let pacer = Pacer::new(Duration::from_secs(1));
        let start = Instant::now();
        pacer.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_send_waits_for_the_gap() {
        let pacer = Pacer::new(Duration::from_millis(300));
        pacer.acquire().await;
        let start = Instant::now();
        pacer.acquire().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(250),
            "Expected ~300ms gap, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn concurrent_senders_are_spaced_out() {
        let pacer = Pacer::new(Duration::from_millis(100));
        let start = Instant::now();
        let a = pacer.clone();
        let b = pacer.clone();
        tokio::join!(pacer.acquire(), a.acquire(), b.acquire());
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(180),
            "Expected three bookings to span two gaps, got {:?}",
            elapsed
        );
    }
}
