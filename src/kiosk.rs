// The capture screen as one object: catalog, compositor, render surface,
// capture session and contact form, driven one tick at a time by the loop in main.
// Visual: whatever `surface()` holds after `tick` is the live picture; the HUD
// decides whether to show it or the frozen still on top.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::KioskService;
use crate::capture::{CaptureEvent, CaptureSession};
use crate::catalog::{BackgroundCatalog, Origin};
use crate::compositor::{Compositor, RenderOutcome};
use crate::error::Error;
use crate::guides::GuideOptions;
use crate::submission::{SubmissionFlow, SubmissionStatus};
use crate::types::FrameBuffer;

/// How long the "sent" banner stays up after a successful submission.
const NOTICE_DURATION: Duration = Duration::from_secs(4);

/// Operator actions, already decoded from the keyboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// 0 = right now, otherwise a countdown of that many seconds.
    Capture(u32),
    NextBackground,
    PreviousBackground,
    SelectBackground(String),
    ToggleGuides,
    Retake,
    Type(String),
    Backspace,
    SwitchField,
    Submit,
}

pub struct Kiosk {
    compositor: Compositor,
    surface: FrameBuffer,
    catalog: BackgroundCatalog,
    session: CaptureSession,
    submission: SubmissionFlow,
    service: Arc<dyn KioskService>,
    show_guides: bool,
    notice: Option<(String, Instant)>,
}

impl Kiosk {
    pub fn new(
        width: usize,
        height: usize,
        catalog: BackgroundCatalog,
        service: Arc<dyn KioskService>,
        show_guides: bool,
    ) -> Self {
        let compositor = Compositor::new(width, height);
        let surface = compositor.new_surface();
        Self {
            compositor,
            surface,
            catalog,
            session: CaptureSession::new(),
            submission: SubmissionFlow::new(),
            service,
            show_guides,
            notice: None,
        }
    }

    pub fn surface(&self) -> &FrameBuffer {
        &self.surface
    }

    pub fn catalog(&self) -> &BackgroundCatalog {
        &self.catalog
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn submission(&self) -> &SubmissionFlow {
        &self.submission
    }

    /// Banner text to show, if one is still current.
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|(_, until)| now < *until)
            .map(|(text, _)| text.as_str())
    }

    /// One render tick: pick up finished background work, render the surface,
    /// advance the countdown, then collect a finished submission.
    pub fn tick(&mut self, frame: Option<&FrameBuffer>, now: Instant) -> Result<RenderOutcome, Error> {
        self.catalog.poll();

        let guides = GuideOptions { show: self.show_guides, counting: self.session.is_counting() };
        let outcome = self
            .compositor
            .render(&mut self.surface, frame, self.catalog.active_image(), guides)?;

        match self.session.tick(&self.surface, now) {
            Ok(CaptureEvent::CountdownTick(remaining)) => tracing::debug!(remaining, "countdown"),
            Ok(CaptureEvent::Captured) => self.on_captured(),
            Ok(_) => {}
            Err(e) => self.on_capture_failed(&e, now),
        }

        self.poll_submission(now);
        Ok(outcome)
    }

    pub fn handle(&mut self, command: Command, now: Instant) -> Result<(), Error> {
        let captured = self.session.still_image().is_some();
        match command {
            Command::Capture(seconds) => {
                match self.session.trigger_capture(seconds, &self.surface, now) {
                    Ok(CaptureEvent::Captured) => self.on_captured(),
                    Ok(CaptureEvent::CountdownStarted(n)) => tracing::debug!(seconds = n, "countdown armed"),
                    Ok(_) => {}
                    Err(e) => self.on_capture_failed(&e, now),
                }
            }
            Command::NextBackground if !captured => {
                let entry = self.catalog.select_next();
                tracing::info!(id = %entry.id, name = %entry.name, "background selected");
            }
            Command::PreviousBackground if !captured => {
                let entry = self.catalog.select_previous();
                tracing::info!(id = %entry.id, name = %entry.name, "background selected");
            }
            Command::SelectBackground(id) if !captured => {
                let entry = self.catalog.select(&id);
                tracing::info!(id = %entry.id, name = %entry.name, "background selected");
            }
            Command::ToggleGuides => self.show_guides = !self.show_guides,
            Command::Retake if !self.submission.is_sending() => {
                self.session.retake();
                self.submission.reset();
            }
            Command::Type(text) if captured => self.submission.type_chars(&text),
            Command::Backspace if captured => self.submission.backspace(),
            Command::SwitchField if captured => self.submission.switch_field(),
            Command::Submit => {
                if let Some(still) = self.session.still_image() {
                    let background = self.session.selected_background();
                    if let Err(e) = self.submission.start(Arc::clone(&self.service), still, background) {
                        tracing::debug!(error = %e, "submission not started");
                    }
                }
            }
            other => tracing::trace!(?other, "command ignored in current state"),
        }
        Ok(())
    }

    /// The photo just taken shows whatever is selected now, which may differ
    /// from the selection when a countdown was started.
    fn on_captured(&mut self) {
        let selected = self.catalog.selected();
        let background = match selected.origin {
            Origin::BuiltIn => None,
            Origin::Remote => Some(selected.id.clone()),
        };
        self.session.set_selected_background(background);
        self.submission.reset();
    }

    /// The session is already back to Idle; tell the operator and keep running.
    fn on_capture_failed(&mut self, err: &Error, now: Instant) {
        tracing::warn!(error = %err, "photo not taken");
        self.notice = Some(("PHOTO FAILED, PLEASE TRY AGAIN".to_string(), now + NOTICE_DURATION));
    }

    fn poll_submission(&mut self, now: Instant) {
        let sent = match self.submission.poll() {
            Some(SubmissionStatus::Sent(receipt)) => Some(receipt.id.clone()),
            _ => None,
        };
        if let Some(capture_id) = sent {
            tracing::info!(%capture_id, "photo delivered, ready for the next visitor");
            self.session.retake();
            self.submission.reset();
            self.notice = Some(("PHOTO SENT, THANK YOU".to_string(), now + NOTICE_DURATION));
        }
    }
}
