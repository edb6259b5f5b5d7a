//! Passive sinks for loop notifications.
//!
//! The caller owns the observer and hands it to the engine at construction.
//! Callbacks are synchronous and must return promptly; anything slow belongs
//! on the other side of a channel (see `ChannelObserver`).

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::domain::{LoopEvent, LoopOutcome, Phase};

/// Receiver of engine notifications
pub trait Observer: Send + Sync {
    /// The engine is about to run `phase`'s action
    fn on_phase_change(&self, iteration: u32, phase: Phase);

    /// A human-readable progress or error line
    fn on_log_line(&self, message: &str, is_error: bool);

    /// The run ended; called once per `Engine::run`
    fn on_finished(&self, _outcome: &LoopOutcome) {}
}

/// Forwards every notification into an unbounded channel.
///
/// Sending never blocks, and a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<LoopEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<LoopEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: LoopEvent) {
        let _ = self.tx.send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_phase_change(&self, iteration: u32, phase: Phase) {
        self.send(LoopEvent::PhaseChanged { iteration, phase });
    }

    fn on_log_line(&self, message: &str, is_error: bool) {
        self.send(LoopEvent::LogLine {
            message: message.to_string(),
            is_error,
        });
    }

    fn on_finished(&self, outcome: &LoopOutcome) {
        self.send(LoopEvent::Finished(outcome.clone()));
    }
}
