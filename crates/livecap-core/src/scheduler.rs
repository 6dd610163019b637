use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies one scheduled expiry. Never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer firing, delivered back to whoever owns the caption state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub stream_id: String,
    pub timer: TimerId,
}

/// One-shot, cancellable caption expiry timers.
///
/// Firings are not callbacks: the scheduler hands back `Expiry` values which
/// the owner feeds into the aggregator on its own event loop.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, stream_id: &str) -> TimerId;
    /// Cancel a pending timer. Unknown or already-fired ids are ignored.
    fn cancel(&mut self, timer: TimerId);
}

/// Schedules each expiry as a tokio sleep task that reports on a channel.
pub struct TokioScheduler {
    next_id: u64,
    tx: mpsc::UnboundedSender<Expiry>,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its firings are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Expiry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            next_id: 0,
            tx,
            tasks: HashMap::new(),
        };
        (scheduler, rx)
    }

    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, stream_id: &str) -> TimerId {
        self.next_id += 1;
        let timer = TimerId(self.next_id);
        // Reap handles of timers that fired and were never cancelled.
        self.tasks.retain(|_, h| !h.is_finished());

        let tx = self.tx.clone();
        let expiry = Expiry {
            stream_id: stream_id.to_string(),
            timer,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(expiry);
        });
        self.tasks.insert(timer, handle);
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(handle) = self.tasks.remove(&timer) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone)]
struct PendingTimer {
    timer: TimerId,
    due: Duration,
    stream_id: String,
}

/// Virtual-clock scheduler. Time only moves when `advance` is called.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    now: Duration,
    pending: Vec<PendingTimer>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Move the clock forward and return every firing now due, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<Expiry> {
        self.now += by;
        let now = self.now;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = pending;
        due.sort_by_key(|p| (p.due, p.timer));
        due.into_iter()
            .map(|p| Expiry {
                stream_id: p.stream_id,
                timer: p.timer,
            })
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, stream_id: &str) -> TimerId {
        self.next_id += 1;
        let timer = TimerId(self.next_id);
        self.pending.push(PendingTimer {
            timer,
            due: self.now + delay,
            stream_id: stream_id.to_string(),
        });
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        self.pending.retain(|p| p.timer != timer);
    }
}
