// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Drive event notification system.
//!
//! Typed change notifications for everything the presentation layer can
//! observe. Listeners are registered on the emitter owned by the drive task;
//! each listener sees every change exactly once, in publication order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::link::handshake::{LinkFault, LinkState};

use super::snapshot::TickSnapshot;
use super::state::RunStatus;
use super::MotorId;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Trait for components that want to observe the drive.
///
/// All methods have default no-op implementations, so listeners can
/// selectively override only the events they care about.
pub trait DriveListener: Send + Sync {
    /// Called for every published cycle snapshot.
    fn on_tick(&self, _snapshot: &TickSnapshot) {}

    /// Called when the loop is armed or disarmed.
    fn on_run_change(&self, _old: RunStatus, _new: RunStatus) {}

    /// Called when the bus link changes state.
    fn on_link_change(&self, _old: LinkState, _new: LinkState) {}

    /// Called when closed-loop control is enabled or disabled.
    fn on_control_enabled_change(&self, _old: bool, _new: bool) {}

    /// Called when a motor's output limit changes.
    fn on_limit_change(&self, _motor: MotorId, _old: f64, _new: f64) {}

    /// Called when the pulse setpoint changes.
    fn on_setpoint_change(&self, _old: i64, _new: i64) {}

    /// Called when the controller gain changes.
    fn on_gain_change(&self, _old: f64, _new: f64) {}

    /// Called when an exchange fails.
    fn on_fault(&self, _fault: &LinkFault) {}
}

/// Manages registered listeners and dispatches events.
pub struct DriveEventEmitter {
    listeners: Vec<(ListenerId, Arc<dyn DriveListener>)>,
}

impl Default for DriveEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveEventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a listener; returns an ID usable with [`unregister`].
    ///
    /// [`unregister`]: Self::unregister
    pub fn register(&mut self, listener: Arc<dyn DriveListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_tick(&self, snapshot: &TickSnapshot) {
        for (_, listener) in &self.listeners {
            listener.on_tick(snapshot);
        }
    }

    pub fn notify_run_change(&self, old: RunStatus, new: RunStatus) {
        for (_, listener) in &self.listeners {
            listener.on_run_change(old, new);
        }
    }

    pub fn notify_link_change(&self, old: LinkState, new: LinkState) {
        for (_, listener) in &self.listeners {
            listener.on_link_change(old, new);
        }
    }

    pub fn notify_control_enabled_change(&self, old: bool, new: bool) {
        for (_, listener) in &self.listeners {
            listener.on_control_enabled_change(old, new);
        }
    }

    pub fn notify_limit_change(&self, motor: MotorId, old: f64, new: f64) {
        for (_, listener) in &self.listeners {
            listener.on_limit_change(motor, old, new);
        }
    }

    pub fn notify_setpoint_change(&self, old: i64, new: i64) {
        for (_, listener) in &self.listeners {
            listener.on_setpoint_change(old, new);
        }
    }

    pub fn notify_gain_change(&self, old: f64, new: f64) {
        for (_, listener) in &self.listeners {
            listener.on_gain_change(old, new);
        }
    }

    pub fn notify_fault(&self, fault: &LinkFault) {
        for (_, listener) in &self.listeners {
            listener.on_fault(fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct TestListener {
        ticks: AtomicUsize,
        faults: AtomicUsize,
    }

    impl DriveListener for TestListener {
        fn on_tick(&self, _snapshot: &TickSnapshot) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }

        fn on_fault(&self, _fault: &LinkFault) {
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_register_and_notify() {
        let mut emitter = DriveEventEmitter::new();
        let listener = Arc::new(TestListener::default());
        let id = emitter.register(listener.clone());
        assert_eq!(emitter.listener_count(), 1);

        emitter.notify_tick(&TickSnapshot::empty());
        assert_eq!(listener.ticks.load(Ordering::Relaxed), 1);
        assert_eq!(listener.faults.load(Ordering::Relaxed), 0);

        emitter.notify_fault(&LinkFault::Transport("gone".into()));
        assert_eq!(listener.faults.load(Ordering::Relaxed), 1);

        emitter.unregister(id);
        assert_eq!(emitter.listener_count(), 0);
        emitter.notify_tick(&TickSnapshot::empty());
        assert_eq!(listener.ticks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_each_listener_sees_each_change_once() {
        let mut emitter = DriveEventEmitter::new();
        let first = Arc::new(TestListener::default());
        let second = Arc::new(TestListener::default());
        emitter.register(first.clone());
        emitter.register(second.clone());

        emitter.notify_tick(&TickSnapshot::empty());
        emitter.notify_tick(&TickSnapshot::empty());

        assert_eq!(first.ticks.load(Ordering::Relaxed), 2);
        assert_eq!(second.ticks.load(Ordering::Relaxed), 2);
    }
}
