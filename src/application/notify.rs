//! Notification and audio capabilities
//!
//! The evaluation engine talks to the user through these injected traits
//! rather than constructing platform audio or notification resources
//! itself. The real dashboard binds platform implementations; the engine
//! and tests only see the interfaces.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Audio cue behavior at trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    OneShot,
    /// Repeats until explicitly silenced.
    Looping,
}

/// Audio output capability. `stop` must synchronously cancel any pending
/// repeat and release the underlying resource.
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: AudioCue);
    fn stop(&self);
    /// Whether a looping alarm is currently sounding.
    fn is_alarming(&self) -> bool;
}

/// Notifier that writes to the log stream. Stands in for the desktop or
/// mobile notification surface when running headless.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("notification: {} - {}", title, body);
    }
}

/// Alarm flag implementation of [`AudioSink`]. Tracks the "active alarm"
/// state the UI reads; looping cues latch the flag until silenced.
#[derive(Default)]
pub struct AlarmBell {
    alarming: AtomicBool,
}

impl AlarmBell {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for AlarmBell {
    fn play(&self, cue: AudioCue) {
        match cue {
            AudioCue::OneShot => info!("audio cue: one-shot"),
            AudioCue::Looping => {
                info!("audio cue: looping alarm started");
                self.alarming.store(true, Ordering::SeqCst);
            }
        }
    }

    fn stop(&self) {
        if self.alarming.swap(false, Ordering::SeqCst) {
            info!("looping alarm silenced");
        }
    }

    fn is_alarming(&self) -> bool {
        self.alarming.load(Ordering::SeqCst)
    }
}
