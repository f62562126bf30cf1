//! Progress feedback for long-running survey operations
//!
//! [`ProgressSink`] is the capability the scan pipeline and the detector
//! report through. Two interchangeable variants are provided: a console
//! sink drawing an indicatif bar, and a headless sink that records state
//! for embedding front-ends and tests and supports cooperative
//! cancellation through a shared [`CancelHandle`].

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capability interface for progress reporting.
///
/// `start` must be called before `update`/`add`. Both fail when the
/// resulting value would exceed the configured maximum. `end` is
/// idempotent and always safe to call, including after an error.
pub trait ProgressSink {
    /// Open the progress range `[min, max]` at `init`
    fn start(&mut self, title: &str, text: &str, min: u64, max: u64, init: u64) -> Result<()>;

    /// Move the indicator to an absolute value. With `restart` the value
    /// may move backwards (a new pass over the same range).
    fn update(&mut self, value: u64, text: Option<&str>, restart: bool) -> Result<()>;

    /// Advance the indicator by a quantum
    fn add(&mut self, quantum: u64, text: Option<&str>) -> Result<()>;

    /// Close the indicator
    fn end(&mut self);

    /// Whether the user asked to cancel the operation
    fn canceled(&self) -> bool;
}

/// Range bookkeeping shared by all sink variants, so the observable
/// contract is identical regardless of presentation.
#[derive(Debug, Default)]
struct ProgressRange {
    min: u64,
    max: u64,
    value: u64,
    started: bool,
}

impl ProgressRange {
    fn start(&mut self, min: u64, max: u64, init: u64) -> Result<()> {
        if max <= min {
            return Err(Error::Progress(format!(
                "invalid range: [{min}, {max}]"
            )));
        }
        if init < min || init > max {
            return Err(Error::Progress(format!(
                "initial value {init} outside [{min}, {max}]"
            )));
        }
        self.min = min;
        self.max = max;
        self.value = init;
        self.started = true;
        Ok(())
    }

    fn update(&mut self, value: u64, restart: bool) -> Result<()> {
        if !self.started {
            return Err(Error::Progress("update before start".into()));
        }
        if value > self.max {
            return Err(Error::Progress(format!(
                "value {value} exceeds maximum {}",
                self.max
            )));
        }
        if value < self.value && !restart {
            return Err(Error::Progress(format!(
                "value {value} moves backwards from {} without restart",
                self.value
            )));
        }
        self.value = value;
        Ok(())
    }

    fn add(&mut self, quantum: u64) -> Result<()> {
        if !self.started {
            return Err(Error::Progress("add before start".into()));
        }
        self.update(self.value + quantum, false)
    }

    fn end(&mut self) {
        self.started = false;
    }
}

// ─── Console variant ────────────────────────────────────────────────────

/// Console progress sink drawing an indicatif bar.
///
/// Cancellation is never observed from the terminal: `canceled` is
/// always false.
#[derive(Default)]
pub struct ConsoleProgress {
    range: ProgressRange,
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn start(&mut self, title: &str, text: &str, min: u64, max: u64, init: u64) -> Result<()> {
        self.range.start(min, max, init)?;

        let bar = ProgressBar::new(max - min);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.green} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(title.to_string());
        bar.set_message(text.to_string());
        bar.set_position(init - min);
        self.bar = Some(bar);
        Ok(())
    }

    fn update(&mut self, value: u64, text: Option<&str>, restart: bool) -> Result<()> {
        self.range.update(value, restart)?;
        if let Some(bar) = &self.bar {
            bar.set_position(value - self.range.min);
            if let Some(text) = text {
                bar.set_message(text.to_string());
            }
        }
        Ok(())
    }

    fn add(&mut self, quantum: u64, text: Option<&str>) -> Result<()> {
        self.range.add(quantum)?;
        if let Some(bar) = &self.bar {
            bar.set_position(self.range.value - self.range.min);
            if let Some(text) = text {
                bar.set_message(text.to_string());
            }
        }
        Ok(())
    }

    fn end(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.range.end();
    }

    fn canceled(&self) -> bool {
        false
    }
}

// ─── Headless variant ───────────────────────────────────────────────────

/// Shared cancellation flag for headless runs.
///
/// Cloneable and thread-safe; a front-end raises it, the pipeline
/// observes it between files and between tiles.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Headless progress sink.
///
/// Records every update so an embedding front-end (or a test) can replay
/// the sequence, and observes cancellation through a [`CancelHandle`].
#[derive(Default)]
pub struct MemoryProgress {
    range: ProgressRange,
    cancel: CancelHandle,
    history: Vec<(u64, Option<String>)>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle through which this sink's run can be canceled
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Recorded (value, text) updates in order
    pub fn history(&self) -> &[(u64, Option<String>)] {
        &self.history
    }

    /// Last recorded value, if any update was made
    pub fn position(&self) -> Option<u64> {
        self.history.last().map(|(v, _)| *v)
    }
}

impl ProgressSink for MemoryProgress {
    fn start(&mut self, _title: &str, text: &str, min: u64, max: u64, init: u64) -> Result<()> {
        self.range.start(min, max, init)?;
        self.history.push((init, Some(text.to_string())));
        Ok(())
    }

    fn update(&mut self, value: u64, text: Option<&str>, restart: bool) -> Result<()> {
        self.range.update(value, restart)?;
        self.history.push((value, text.map(str::to_string)));
        Ok(())
    }

    fn add(&mut self, quantum: u64, text: Option<&str>) -> Result<()> {
        self.range.add(quantum)?;
        self.history
            .push((self.range.value, text.map(str::to_string)));
        Ok(())
    }

    fn end(&mut self) {
        self.range.end();
    }

    fn canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_overflow(sink: &mut dyn ProgressSink) {
        sink.start("scan", "working", 0, 100, 0).unwrap();
        sink.update(50, None, false).unwrap();
        assert!(sink.update(101, None, false).is_err());
        assert!(sink.add(51, None).is_err());
        // Failed updates leave the value untouched
        sink.add(50, None).unwrap();
        sink.end();
        sink.end(); // idempotent
    }

    #[test]
    fn test_overflow_contract_console() {
        let mut sink = ConsoleProgress::new();
        exercise_overflow(&mut sink);
    }

    #[test]
    fn test_overflow_contract_memory() {
        let mut sink = MemoryProgress::new();
        exercise_overflow(&mut sink);
        assert_eq!(sink.position(), Some(100));
    }

    #[test]
    fn test_update_before_start() {
        let mut sink = MemoryProgress::new();
        assert!(sink.update(1, None, false).is_err());
        assert!(sink.add(1, None).is_err());
    }

    #[test]
    fn test_backwards_requires_restart() {
        let mut sink = MemoryProgress::new();
        sink.start("scan", "", 0, 10, 0).unwrap();
        sink.update(7, None, false).unwrap();
        assert!(sink.update(3, None, false).is_err());
        sink.update(3, None, true).unwrap();
    }

    #[test]
    fn test_cancel_handle() {
        let sink = MemoryProgress::new();
        let handle = sink.cancel_handle();
        assert!(!sink.canceled());
        handle.cancel();
        assert!(sink.canceled());
    }
}
