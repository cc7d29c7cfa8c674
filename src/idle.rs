//! Session idle detection
//!
//! Polls the Hyprland cursor position on a tokio runtime in a background
//! thread. Any cursor movement counts as activity; a watch fires once per
//! idle period when the time since the later of the last activity and the
//! watch's registration reaches its threshold.

use calloop::channel::Sender;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time;

use crate::host::HostEvent;
use crate::ipc::{self, CursorPos};
use crate::platform::{SensorError, WatchId};

enum WatchCommand {
    Add(WatchId, Duration),
    Remove(WatchId),
}

/// Handle to the polling thread. Dropping it stops the thread.
pub struct HyprIdleSensor {
    commands: mpsc::UnboundedSender<WatchCommand>,
    next_id: u64,
}

impl HyprIdleSensor {
    /// Start polling. Fails if there is no Hyprland instance to poll.
    pub fn spawn(poll_interval: Duration, events: Sender<HostEvent>) -> Result<Self, SensorError> {
        let socket = ipc::socket_path().map_err(|e| SensorError::Unavailable(e.to_string()))?;
        debug!("Polling cursor via {}", socket.display());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SensorError::Unavailable(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("idle-sensor".into())
            .spawn(move || runtime.block_on(run_poll_loop(poll_interval, rx, events)))
            .map_err(|e| SensorError::Unavailable(e.to_string()))?;

        info!("Idle sensor started: poll={}ms", poll_interval.as_millis());
        Ok(Self {
            commands: tx,
            next_id: 0,
        })
    }

    pub fn add_watch(&mut self, threshold: Duration) -> Result<WatchId, SensorError> {
        self.next_id += 1;
        let id = WatchId(self.next_id);
        self.commands
            .send(WatchCommand::Add(id, threshold))
            .map_err(|_| SensorError::Unavailable("idle sensor thread exited".into()))?;
        Ok(id)
    }

    pub fn remove_watch(&mut self, id: WatchId) {
        // A dead thread has no watches left to remove
        let _ = self.commands.send(WatchCommand::Remove(id));
    }
}

#[derive(Debug)]
struct Watch {
    threshold: Duration,
    armed_at: Instant,
    fired: bool,
}

/// Idle watches and the last time activity was seen
#[derive(Debug)]
struct WatchSet {
    watches: HashMap<WatchId, Watch>,
    last_active: Instant,
}

impl WatchSet {
    fn new(now: Instant) -> Self {
        Self {
            watches: HashMap::new(),
            last_active: now,
        }
    }

    fn add(&mut self, id: WatchId, threshold: Duration, now: Instant) {
        self.watches.insert(
            id,
            Watch {
                threshold,
                armed_at: now,
                fired: false,
            },
        );
    }

    fn remove(&mut self, id: WatchId) {
        self.watches.remove(&id);
    }

    fn activity(&mut self, now: Instant) {
        self.last_active = now;
        for watch in self.watches.values_mut() {
            watch.fired = false;
        }
    }

    /// Watches that just crossed their threshold
    fn due(&mut self, now: Instant) -> Vec<WatchId> {
        let last_active = self.last_active;
        let mut due: Vec<WatchId> = self
            .watches
            .iter_mut()
            .filter(|(_, w)| !w.fired && now.duration_since(last_active.max(w.armed_at)) >= w.threshold)
            .map(|(id, w)| {
                w.fired = true;
                *id
            })
            .collect();
        due.sort_by_key(|id| id.0);
        due
    }
}

async fn run_poll_loop(
    poll_interval: Duration,
    mut commands: mpsc::UnboundedReceiver<WatchCommand>,
    events: Sender<HostEvent>,
) {
    let mut watches = WatchSet::new(Instant::now());
    let mut last_cursor: Option<CursorPos> = None;
    let mut interval = time::interval(poll_interval);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(WatchCommand::Add(id, threshold)) => watches.add(id, threshold, Instant::now()),
                Some(WatchCommand::Remove(id)) => watches.remove(id),
                None => break,
            },
            _ = interval.tick() => {
                if !poll_once(&mut watches, &mut last_cursor, &events).await {
                    break;
                }
            }
        }
    }

    debug!("Idle sensor stopped");
}

/// Returns false once the event loop has gone away
async fn poll_once(
    watches: &mut WatchSet,
    last_cursor: &mut Option<CursorPos>,
    events: &Sender<HostEvent>,
) -> bool {
    let cursor = match ipc::get_cursor_pos().await {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to get cursor position: {}", e);
            return true;
        }
    };

    let now = Instant::now();
    let moved = last_cursor.is_some_and(|last| last != cursor);
    *last_cursor = Some(cursor);

    if moved {
        watches.activity(now);
        if events.send(HostEvent::Activity).is_err() {
            return false;
        }
    }

    for id in watches.due(now) {
        info!("Idle threshold reached for watch {:?}", id);
        if events.send(HostEvent::IdleReached(id)).is_err() {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn watch_fires_once_per_idle_period() {
        let t0 = Instant::now();
        let mut set = WatchSet::new(t0);
        set.add(WatchId(1), 10 * SEC, t0);

        assert!(set.due(t0 + 9 * SEC).is_empty());
        assert_eq!(set.due(t0 + 10 * SEC), vec![WatchId(1)]);
        assert!(set.due(t0 + 20 * SEC).is_empty());

        set.activity(t0 + 21 * SEC);
        assert!(set.due(t0 + 30 * SEC).is_empty());
        assert_eq!(set.due(t0 + 31 * SEC), vec![WatchId(1)]);
    }

    #[test]
    fn new_watch_counts_from_registration() {
        let t0 = Instant::now();
        let mut set = WatchSet::new(t0);

        // Long idle before the watch exists must not fire it immediately
        let armed = t0 + 600 * SEC;
        set.add(WatchId(1), 10 * SEC, armed);
        assert!(set.due(armed + SEC).is_empty());
        assert_eq!(set.due(armed + 10 * SEC), vec![WatchId(1)]);
    }

    #[test]
    fn removed_watch_never_fires() {
        let t0 = Instant::now();
        let mut set = WatchSet::new(t0);
        set.add(WatchId(1), SEC, t0);
        set.add(WatchId(2), 2 * SEC, t0);
        set.remove(WatchId(1));

        assert_eq!(set.due(t0 + 5 * SEC), vec![WatchId(2)]);
    }
}
