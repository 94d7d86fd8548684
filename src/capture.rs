// Capture / countdown state machine.
// Visual: Idle shows the live view; Counting overlays a big number that drops once
// per second; Captured freezes on the still that was taken from the render surface.

use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::codecs::jpeg::JpegEncoder;

use crate::error::Error;
use crate::scheduler::Interval;
use crate::types::FrameBuffer;

pub const JPEG_QUALITY: u8 = 90;
pub const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// An encoded snapshot of the render surface.
#[derive(Clone, Debug)]
pub struct StillImage {
    pub jpeg: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Decoded copy for on-screen review.
    pub preview: FrameBuffer,
}

impl StillImage {
    /// Encode `surface` as JPEG at `JPEG_QUALITY`.
    /// A never-rendered (black) surface still encodes fine.
    pub fn encode(surface: &FrameBuffer) -> Result<Self, Error> {
        if surface.width == 0 || surface.height == 0 {
            return Err(Error::Surface(format!(
                "snapshot: surface is {}x{}",
                surface.width, surface.height
            )));
        }
        let rgb = surface.to_rgb_image();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;
        Ok(Self {
            jpeg,
            width: surface.width,
            height: surface.height,
            preview: surface.clone(),
        })
    }

    /// Base64 of the JPEG bytes, without any `data:` URI prefix.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.jpeg)
    }
}

#[derive(Debug)]
pub enum CaptureState {
    Idle,
    Counting { remaining: u32, timer: Interval },
    Captured(StillImage),
}

/// What a trigger or tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Nothing changed (e.g. trigger while a countdown is already running).
    Ignored,
    CountdownStarted(u32),
    CountdownTick(u32),
    Captured,
}

/// One visit to the capture screen.
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    selected_background: Option<String>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self { state: CaptureState::Idle, selected_background: None }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, CaptureState::Idle)
    }

    pub fn is_counting(&self) -> bool {
        matches!(self.state, CaptureState::Counting { .. })
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        match &self.state {
            CaptureState::Counting { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }

    pub fn still_image(&self) -> Option<&StillImage> {
        match &self.state {
            CaptureState::Captured(still) => Some(still),
            _ => None,
        }
    }

    /// Background id in effect when the photo was taken.
    /// `None` means the built-in "no background" entry.
    pub fn selected_background(&self) -> Option<&str> {
        self.selected_background.as_deref()
    }

    pub fn set_selected_background(&mut self, id: Option<String>) {
        self.selected_background = id;
    }

    /// `seconds == 0` snapshots `surface` right now; otherwise a countdown starts.
    /// Only valid from Idle: a running countdown or a captured still ignore it.
    pub fn trigger_capture(&mut self, seconds: u32, surface: &FrameBuffer, now: Instant) -> Result<CaptureEvent, Error> {
        if !self.is_idle() {
            tracing::debug!(seconds, "capture trigger ignored, session busy");
            return Ok(CaptureEvent::Ignored);
        }

        if seconds == 0 {
            self.snapshot(surface)?;
            return Ok(CaptureEvent::Captured);
        }

        tracing::info!(seconds, "countdown started");
        self.state = CaptureState::Counting {
            remaining: seconds,
            timer: Interval::start(COUNTDOWN_PERIOD, now),
        };
        Ok(CaptureEvent::CountdownStarted(seconds))
    }

    /// Advance the countdown; when it reaches zero the surface is snapshotted.
    /// Call once per render tick with the surface the loop last produced.
    pub fn tick(&mut self, surface: &FrameBuffer, now: Instant) -> Result<CaptureEvent, Error> {
        let CaptureState::Counting { remaining, timer } = &mut self.state else {
            return Ok(CaptureEvent::Ignored);
        };
        if !timer.poll(now) {
            return Ok(CaptureEvent::Ignored);
        }

        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return Ok(CaptureEvent::CountdownTick(*remaining));
        }

        timer.cancel();
        self.snapshot(surface)?;
        Ok(CaptureEvent::Captured)
    }

    /// Drop the still and go back to the live view.
    pub fn retake(&mut self) {
        if matches!(self.state, CaptureState::Captured(_)) {
            tracing::info!("retake");
            self.state = CaptureState::Idle;
        }
    }

    /// Captured on success; back to Idle on failure so the operator can try again.
    fn snapshot(&mut self, surface: &FrameBuffer) -> Result<(), Error> {
        match StillImage::encode(surface) {
            Ok(still) => {
                tracing::info!(bytes = still.jpeg.len(), width = still.width, height = still.height, "photo captured");
                self.state = CaptureState::Captured(still);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "snapshot failed");
                self.state = CaptureState::Idle;
                Err(e)
            }
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> FrameBuffer {
        FrameBuffer::filled(32, 18, 0x0080_4020)
    }

    #[test]
    fn immediate_capture_is_synchronous() {
        let mut session = CaptureSession::new();
        let ev = session.trigger_capture(0, &surface(), Instant::now()).unwrap();

        assert_eq!(ev, CaptureEvent::Captured);
        let still = session.still_image().expect("still after immediate capture");
        assert!(!still.jpeg.is_empty());
        assert_eq!(&still.jpeg[..2], &[0xFF, 0xD8]); // JPEG SOI marker
        assert_eq!((still.width, still.height), (32, 18));
    }

    #[test]
    fn blank_surface_still_encodes() {
        let mut session = CaptureSession::new();
        let blank = FrameBuffer::new(16, 16);
        session.trigger_capture(0, &blank, Instant::now()).unwrap();
        assert!(session.still_image().is_some());
    }

    #[test]
    fn countdown_takes_exactly_n_ticks() {
        let t0 = Instant::now();
        let mut session = CaptureSession::new();
        let fb = surface();

        assert_eq!(session.trigger_capture(3, &fb, t0).unwrap(), CaptureEvent::CountdownStarted(3));
        assert_eq!(session.countdown_remaining(), Some(3));

        let mut events = Vec::new();
        // Poll at 60 Hz for five seconds.
        for frame in 0..300u64 {
            let now = t0 + Duration::from_millis(frame * 1000 / 60);
            let ev = session.tick(&fb, now).unwrap();
            if ev != CaptureEvent::Ignored {
                events.push(ev);
            }
        }

        assert_eq!(
            events,
            vec![CaptureEvent::CountdownTick(2), CaptureEvent::CountdownTick(1), CaptureEvent::Captured]
        );
        assert!(session.still_image().is_some());
    }

    #[test]
    fn capture_happens_on_the_nth_second_not_before() {
        let t0 = Instant::now();
        let mut session = CaptureSession::new();
        let fb = surface();
        session.trigger_capture(2, &fb, t0).unwrap();

        session.tick(&fb, t0 + Duration::from_millis(1999)).unwrap();
        assert!(session.is_counting());
        assert_eq!(session.countdown_remaining(), Some(1));

        assert_eq!(session.tick(&fb, t0 + Duration::from_secs(2)).unwrap(), CaptureEvent::Captured);
    }

    #[test]
    fn repeated_trigger_while_counting_is_ignored() {
        let t0 = Instant::now();
        let mut session = CaptureSession::new();
        let fb = surface();
        session.trigger_capture(5, &fb, t0).unwrap();

        let later = t0 + Duration::from_millis(500);
        assert_eq!(session.trigger_capture(3, &fb, later).unwrap(), CaptureEvent::Ignored);
        assert_eq!(session.trigger_capture(0, &fb, later).unwrap(), CaptureEvent::Ignored);
        assert_eq!(session.countdown_remaining(), Some(5));

        // Still a single one-second timer: exactly one tick at t0+1s.
        assert_eq!(session.tick(&fb, t0 + Duration::from_secs(1)).unwrap(), CaptureEvent::CountdownTick(4));
        assert_eq!(session.tick(&fb, t0 + Duration::from_secs(1)).unwrap(), CaptureEvent::Ignored);
    }

    #[test]
    fn retake_clears_still_and_returns_to_idle() {
        let mut session = CaptureSession::new();
        session.trigger_capture(0, &surface(), Instant::now()).unwrap();
        session.retake();

        assert!(session.is_idle());
        assert!(session.still_image().is_none());

        // and a new capture works right away
        session.trigger_capture(0, &surface(), Instant::now()).unwrap();
        assert!(session.still_image().is_some());
    }

    #[test]
    fn trigger_while_captured_keeps_the_photo() {
        let mut session = CaptureSession::new();
        let first = FrameBuffer::filled(8, 8, 0x00FF_0000);
        session.trigger_capture(0, &first, Instant::now()).unwrap();

        let second = FrameBuffer::filled(8, 8, 0x0000_FF00);
        assert_eq!(session.trigger_capture(0, &second, Instant::now()).unwrap(), CaptureEvent::Ignored);
        assert_eq!(session.still_image().unwrap().preview, first);
    }

    #[test]
    fn failed_countdown_snapshot_returns_to_idle() {
        let t0 = Instant::now();
        let mut session = CaptureSession::new();
        let empty = FrameBuffer::new(0, 0);
        session.trigger_capture(1, &empty, t0).unwrap();

        assert!(session.tick(&empty, t0 + Duration::from_secs(1)).is_err());
        assert!(session.is_idle());
        assert_eq!(session.countdown_remaining(), None);

        // A new trigger is accepted right away.
        let ev = session.trigger_capture(0, &surface(), t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(ev, CaptureEvent::Captured);
    }

    #[test]
    fn immediate_snapshot_failure_stays_idle() {
        let mut session = CaptureSession::new();
        assert!(session.trigger_capture(0, &FrameBuffer::new(0, 0), Instant::now()).is_err());
        assert!(session.is_idle());
    }

    #[test]
    fn snapshot_takes_latest_surface_content() {
        let t0 = Instant::now();
        let mut session = CaptureSession::new();
        session.trigger_capture(1, &FrameBuffer::filled(4, 4, 1), t0).unwrap();

        let latest = FrameBuffer::filled(4, 4, 2);
        session.tick(&latest, t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(session.still_image().unwrap().preview, latest);
    }

    #[test]
    fn base64_has_no_data_uri_prefix() {
        let still = StillImage::encode(&surface()).unwrap();
        let b64 = still.to_base64();
        assert!(!b64.starts_with("data:"));
        assert_eq!(BASE64_STANDARD.decode(b64).unwrap(), still.jpeg);
    }
}
