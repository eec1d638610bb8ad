//! Debounced trigger state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cycles the trigger stays active after the last positive evidence.
pub const TRIGGER_COUNTDOWN: u32 = 4;

/// Classification label reported while the trigger is active.
pub const TRIGGER_LABEL: &str = "TRIGGER";

/// Shared trigger flag, written by the polling loop and read by queries.
#[derive(Clone, Debug, Default)]
pub struct TriggerFlag(Arc<AtomicBool>);

impl TriggerFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, active: bool) {
        self.0.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Countdown hysteresis: positive evidence re-arms the countdown, each quiet
/// cycle consumes one step, and the trigger drops once it runs out.
#[derive(Clone, Debug)]
pub struct TriggerMachine {
    hold: u32,
    countdown: u32,
}

impl TriggerMachine {
    pub fn new() -> Self {
        Self::with_hold(TRIGGER_COUNTDOWN)
    }

    pub fn with_hold(hold: u32) -> Self {
        Self { hold, countdown: 0 }
    }

    /// Feed one cycle's immediate evidence; returns the debounced state.
    pub fn step(&mut self, immediate: bool) -> bool {
        if immediate {
            self.countdown = self.hold;
            return true;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return true;
        }
        false
    }
}

impl Default for TriggerMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pulse_holds_for_countdown_cycles() {
        let mut machine = TriggerMachine::new();
        let inputs = [true, false, false, false, false, false];
        let outputs: Vec<bool> = inputs.iter().map(|&i| machine.step(i)).collect();
        assert_eq!(outputs, vec![true, true, true, true, true, false]);
    }

    #[test]
    fn new_evidence_rearms_countdown() {
        let mut machine = TriggerMachine::with_hold(2);
        assert!(machine.step(true));
        assert!(machine.step(false));
        assert!(machine.step(true));
        assert!(machine.step(false));
        assert!(machine.step(false));
        assert!(!machine.step(false));
        assert!(!machine.step(false));
    }

    #[test]
    fn quiet_machine_stays_inactive() {
        let mut machine = TriggerMachine::new();
        assert!((0..10).all(|_| !machine.step(false)));
    }

    #[test]
    fn flag_is_shared_between_clones() {
        let flag = TriggerFlag::new();
        let reader = flag.clone();
        assert!(!reader.is_active());
        flag.set(true);
        assert!(reader.is_active());
    }
}
