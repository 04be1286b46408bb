//! Post-write staleness window

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Remembers when the primary last executed a write.
///
/// While the time since that write is below `proxy_delay`, reads are pinned to the primary
/// so they cannot observe data the replicas have not received yet. Staleness is inferred purely
/// from this local timer; replication position is never consulted.
///
/// A tracker is usually shared (behind an `Arc`) by every proxy built over the same logical
/// primary, so a write through one proxy delays replica reads through all of them. Give a proxy
/// its own tracker for per-connection windows.
///
/// Uses tokio's clock, so `tokio::time::pause()` and `advance()` control it in tests.
#[derive(Debug)]
pub struct WriteRecency {
   proxy_delay: Duration,
   last_write_at: Mutex<Option<Instant>>,
}

impl WriteRecency {
   /// Create a tracker that has never seen a write.
   pub fn new(proxy_delay: Duration) -> Self {
      Self {
         proxy_delay,
         last_write_at: Mutex::new(None),
      }
   }

   /// Length of the staleness window.
   pub fn proxy_delay(&self) -> Duration {
      self.proxy_delay
   }

   /// Record a write that just completed on the primary.
   ///
   /// The stored timestamp never moves backwards, even if concurrent callers race.
   pub fn record_write(&self) {
      let now = Instant::now();
      let mut last = self.last_write_at.lock();
      *last = Some(last.map_or(now, |prev| prev.max(now)));
   }

   /// True while the most recent write is younger than `proxy_delay`.
   pub fn is_recent_write(&self) -> bool {
      match *self.last_write_at.lock() {
         Some(at) => at.elapsed() < self.proxy_delay,
         None => false,
      }
   }

   /// Timestamp of the most recent recorded write, if any.
   pub fn last_write_at(&self) -> Option<Instant> {
      *self.last_write_at.lock()
   }
}
