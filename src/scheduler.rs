// Explicit, cancelable timing primitives for the kiosk loop.
// - `RenderLoop`: re-arms after every tick until canceled (window closed / teardown).
// - `Interval`: a repeating timer polled from the loop (the countdown's one-second tick).

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Shared cancel flag. Cloning hands teardown code a way to stop the loop.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Rc<Cell<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.get()
    }
}

/// What a tick asks the loop to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// A frame was produced.
    Rendered,
    /// Nothing to draw yet (e.g. camera not ready); still re-armed.
    Idle,
}

pub struct RenderLoop {
    cancel: CancelHandle,
    ticks: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self { cancel: CancelHandle::default(), ticks: 0 }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run `tick` once per iteration until the handle is canceled.
    /// Every outcome of `tick` re-arms the loop; only an error or a cancel stops it.
    pub fn run<E>(&mut self, mut tick: impl FnMut(&CancelHandle) -> Result<Tick, E>) -> Result<(), E> {
        while !self.cancel.is_canceled() {
            match tick(&self.cancel)? {
                Tick::Rendered => self.ticks += 1,
                Tick::Idle => tracing::trace!("tick produced no frame"),
            }
        }
        tracing::debug!(ticks = self.ticks, "render loop canceled");
        Ok(())
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Repeating timer. Armed on creation; each `poll` reports at most one due tick
/// so a stalled loop catches up one tick per frame instead of skipping ticks.
#[derive(Debug)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
}

impl Interval {
    pub fn start(period: Duration, now: Instant) -> Self {
        Self { period, next: Some(now + period) }
    }

    pub fn cancel(&mut self) {
        self.next = None;
    }

    /// True when a period has elapsed; the next deadline moves one period on.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next {
            Some(due) if now >= due => {
                self.next = Some(due + self.period);
                true
            }
            _ => false,
        }
    }
}
