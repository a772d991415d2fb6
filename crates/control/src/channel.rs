//! Control channel - the only bridge between the network and the simulation
//!
//! Parameter updates are last-writer-wins: each live-tunable parameter has a
//! single `watch` slot, so a burst of updates for the same parameter collapses
//! to the newest one and memory stays bounded. Actions and reset requests keep
//! their order in a bounded queue; when that queue is full the new message is
//! dropped and logged. Stop is a latched flag.
//!
//! Nothing is applied here. The simulation loop calls
//! [`ControlChannel::drain_into`] at a tick boundary and applies the batch
//! itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, watch};

use crate::error::ControlError;
use crate::message::ControlEvent;
use crate::osc::OscTime;
use crate::types::{GameAction, ParamName};

/// Default depth of the action queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// The newest pending value of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamUpdate {
    pub name: ParamName,
    pub value: f64,
    /// Arrival order across all parameters
    pub seq: u64,
    pub timetag: Option<OscTime>,
    /// Wall-clock time the update reached the process
    pub received: SystemTime,
}

/// Ordered, non-parameter requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Action(GameAction),
    Reset,
}

/// Counters kept by the channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlStats {
    /// Parameter updates accepted into a slot
    pub params: u64,
    /// Parameter updates overwritten before they were applied
    pub superseded: u64,
    /// Commands accepted into the queue
    pub commands: u64,
    /// Commands dropped because the queue was full
    pub dropped: u64,
    /// Datagrams or messages rejected by the decoder
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    params: AtomicU64,
    superseded: AtomicU64,
    commands: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug)]
struct Shared {
    params: [watch::Sender<Option<ParamUpdate>>; ParamName::COUNT],
    commands: mpsc::Sender<Command>,
    stop: watch::Sender<bool>,
    /// Set while a slot holds a value the loop has not drained yet
    pending: [AtomicBool; ParamName::COUNT],
    seq: AtomicU64,
    counters: Counters,
}

/// Producer side; cheap to clone and safe to use from any thread or task.
#[derive(Debug, Clone)]
pub struct ControlSender {
    shared: Arc<Shared>,
}

/// Consumer side, owned by the simulation loop.
#[derive(Debug)]
pub struct ControlChannel {
    shared: Arc<Shared>,
    params: [watch::Receiver<Option<ParamUpdate>>; ParamName::COUNT],
    commands: mpsc::Receiver<Command>,
    stop: watch::Receiver<bool>,
}

/// Everything pending at one tick boundary
#[derive(Debug, Default)]
pub struct ControlBatch {
    params: [Option<ParamUpdate>; ParamName::COUNT],
    pub commands: Vec<Command>,
}

impl ControlBatch {
    pub fn clear(&mut self) {
        self.params = [None; ParamName::COUNT];
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.params.iter().all(Option::is_none) && self.commands.is_empty()
    }

    /// At most one update per parameter, in [`ParamName::ALL`] order.
    pub fn params(&self) -> impl Iterator<Item = &ParamUpdate> {
        self.params.iter().flatten()
    }

    pub fn param(&self, name: ParamName) -> Option<&ParamUpdate> {
        self.params[name.index()].as_ref()
    }
}

/// Create a connected sender/channel pair. `capacity` bounds the command queue.
pub fn channel(capacity: usize) -> (ControlSender, ControlChannel) {
    let (commands_tx, commands_rx) = mpsc::channel(capacity.max(1));
    let (stop_tx, stop_rx) = watch::channel(false);
    let params = std::array::from_fn(|_| watch::channel(None).0);

    let shared = Arc::new(Shared {
        params,
        commands: commands_tx,
        stop: stop_tx,
        pending: std::array::from_fn(|_| AtomicBool::new(false)),
        seq: AtomicU64::new(0),
        counters: Counters::default(),
    });
    let receivers = std::array::from_fn(|i| shared.params[i].subscribe());

    (
        ControlSender {
            shared: Arc::clone(&shared),
        },
        ControlChannel {
            shared,
            params: receivers,
            commands: commands_rx,
            stop: stop_rx,
        },
    )
}

impl ControlSender {
    /// Publish a decoded event.
    pub fn send(&self, event: ControlEvent) -> Result<(), ControlError> {
        match event {
            ControlEvent::Param {
                name,
                value,
                timetag,
                received,
            } => {
                self.publish(name, value, timetag, received);
                Ok(())
            }
            ControlEvent::Action(action) => self.push(Command::Action(action)),
            ControlEvent::Reset => self.push(Command::Reset),
            ControlEvent::Stop => {
                self.request_stop();
                Ok(())
            }
        }
    }

    /// Replace the pending value of `name`, stamped with the current time.
    /// Never blocks, never fails.
    pub fn update_param(&self, name: ParamName, value: f64, timetag: Option<OscTime>) {
        self.publish(name, value, timetag, SystemTime::now());
    }

    fn publish(&self, name: ParamName, value: f64, timetag: Option<OscTime>, received: SystemTime) {
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        let previous = self.shared.params[name.index()].send_replace(Some(ParamUpdate {
            name,
            value,
            seq,
            timetag,
            received,
        }));
        let counters = &self.shared.counters;
        counters.params.fetch_add(1, Ordering::Relaxed);
        if self.shared.pending[name.index()].swap(true, Ordering::AcqRel) {
            counters.superseded.fetch_add(1, Ordering::Relaxed);
            if let Some(previous) = previous {
                log::trace!("{} {} superseded by {}", name.as_str(), previous.value, value);
            }
        }
    }

    pub fn send_action(&self, action: GameAction) -> Result<(), ControlError> {
        self.push(Command::Action(action))
    }

    pub fn request_reset(&self) -> Result<(), ControlError> {
        self.push(Command::Reset)
    }

    /// Latch the stop flag. Idempotent.
    pub fn request_stop(&self) {
        self.shared.stop.send_replace(true);
    }

    /// Count a message the decoder refused.
    pub fn record_rejected(&self) {
        self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn push(&self, command: Command) -> Result<(), ControlError> {
        match self.shared.commands.try_send(command) {
            Ok(()) => {
                self.shared.counters.commands.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(command)) => {
                self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("control queue full, dropping {:?}", command);
                Err(ControlError::QueueFull)
            }
            // The simulation loop is gone; nobody is left to apply it.
            Err(mpsc::error::TrySendError::Closed(_)) => Ok(()),
        }
    }
}

impl ControlChannel {
    /// Another producer handle for this channel.
    pub fn sender(&self) -> ControlSender {
        ControlSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Move everything pending into `batch` (which is cleared first).
    pub fn drain_into(&mut self, batch: &mut ControlBatch) {
        batch.clear();
        for (i, (slot, rx)) in batch.params.iter_mut().zip(self.params.iter_mut()).enumerate() {
            if rx.has_changed().unwrap_or(false) {
                self.shared.pending[i].store(false, Ordering::Release);
                *slot = *rx.borrow_and_update();
            }
        }
        while let Ok(command) = self.commands.try_recv() {
            batch.commands.push(command);
        }
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    pub fn stats(&self) -> ControlStats {
        let c = &self.shared.counters;
        ControlStats {
            params: c.params.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
            commands: c.commands.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins_per_param() {
        let (tx, mut rx) = channel(8);
        tx.update_param(ParamName::Bpm, 100.0, None);
        tx.update_param(ParamName::Bpm, 140.0, None);
        tx.update_param(ParamName::LockDelay, 0.2, None);

        let mut batch = ControlBatch::default();
        rx.drain_into(&mut batch);
        assert_eq!(batch.params().count(), 2);
        assert_eq!(batch.param(ParamName::Bpm).map(|p| p.value), Some(140.0));
        assert_eq!(batch.param(ParamName::LockDelay).map(|p| p.value), Some(0.2));

        // applied exactly once
        rx.drain_into(&mut batch);
        assert!(batch.is_empty());
    }

    #[test]
    fn commands_keep_order_and_overflow_drops() {
        let (tx, mut rx) = channel(2);
        tx.send_action(GameAction::MoveLeft).unwrap();
        tx.request_reset().unwrap();
        assert!(matches!(
            tx.send_action(GameAction::MoveRight),
            Err(ControlError::QueueFull)
        ));

        let mut batch = ControlBatch::default();
        rx.drain_into(&mut batch);
        assert_eq!(
            batch.commands,
            vec![Command::Action(GameAction::MoveLeft), Command::Reset]
        );
        assert_eq!(rx.stats().dropped, 1);
        assert_eq!(rx.stats().commands, 2);
    }

    #[test]
    fn stop_is_latched() {
        let (tx, rx) = channel(1);
        assert!(!rx.stop_requested());
        tx.send(ControlEvent::Stop).unwrap();
        assert!(rx.stop_requested());
        tx.request_stop();
        assert!(rx.stop_requested());
    }

    #[test]
    fn updates_keep_their_arrival_time() {
        let (tx, mut rx) = channel(8);
        let arrived = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000);
        tx.send(ControlEvent::Param {
            name: ParamName::Bpm,
            value: 120.0,
            timetag: Some(9),
            received: arrived,
        })
        .unwrap();
        let before = SystemTime::now();
        tx.update_param(ParamName::LockDelay, 0.1, None);

        let mut batch = ControlBatch::default();
        rx.drain_into(&mut batch);
        let bpm = batch.param(ParamName::Bpm).unwrap();
        assert_eq!((bpm.received, bpm.timetag), (arrived, Some(9)));
        assert!(batch.param(ParamName::LockDelay).unwrap().received >= before);
    }

    #[test]
    fn works_across_threads() {
        let (tx, mut rx) = channel(8);
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                tx.update_param(ParamName::GravityInterval, i as f64, None);
            }
        });
        handle.join().unwrap();
        let mut batch = ControlBatch::default();
        rx.drain_into(&mut batch);
        assert_eq!(
            batch.param(ParamName::GravityInterval).map(|p| p.value),
            Some(99.0)
        );
        assert_eq!(rx.stats().params, 100);
    }
}
