// THEORY:
// Per-frame loops (quality sampling, guide overlay) are paced by the display, not by
// a timer of their own. `RefreshBus` is that display signal: the host calls `tick`
// once per refresh and every subscribed loop wakes up once.
//
// A broadcast channel is used so that a slow loop that misses ticks simply resumes
// at the newest one (lagging is not an error), and so that closing the bus ends
// every loop subscribed to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Ticks buffered per subscriber before the oldest are dropped.
const DEFAULT_CAPACITY: usize = 4;

/// Result of waiting for the next refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// A new frame should be drawn. Carries the frame number.
    Frame(u64),
    /// The display is gone. The loop should exit.
    Closed,
}

/// The display refresh signal shared by every per-frame loop.
#[derive(Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<u64>,
    frame_counter: Arc<AtomicU64>,
}

impl RefreshBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel::<u64>(capacity.max(1));
        Self {
            tx,
            frame_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> RefreshReceiver {
        RefreshReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Signals one display refresh and returns its frame number.
    pub fn tick(&self) -> u64 {
        let frame = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        // No subscribers simply means nothing is drawing right now.
        let _ = self.tx.send(frame);
        frame
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Drives the bus from a fixed-rate clock, for hosts without a real display.
    pub fn spawn_clock(&self, hz: u32) -> JoinHandle<()> {
        let bus = self.clone();
        let period = Duration::from_secs_f64(1.0 / hz.max(1) as f64);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                bus.tick();
            }
        })
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One loop's view of the refresh signal.
pub struct RefreshReceiver {
    rx: broadcast::Receiver<u64>,
}

impl RefreshReceiver {
    /// Waits for the next refresh. Missed refreshes are skipped, never replayed.
    pub async fn next(&mut self) -> Refresh {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Refresh::Frame(frame),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Refresh::Closed,
            }
        }
    }
}
