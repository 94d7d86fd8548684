// Submission of a captured still with the visitor's contact details.
// Visual: after capture the operator types a phone and/or email under the photo
// and presses Enter; a status line reports "sending", errors, or success.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use thiserror::Error;

use crate::api::{CaptureReceipt, CaptureRequest, KioskService, SmsRequest};
use crate::capture::StillImage;
use crate::error::Error;

const MAX_FIELD_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Enter a phone number or an email address")]
    MissingContact,

    #[error("Sending failed, please try again")]
    Ingestion(#[source] Error),

    #[error("Submission worker stopped unexpectedly")]
    WorkerLost,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Field {
    #[default]
    Phone,
    Email,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub phone: String,
    pub email: String,
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

impl ContactForm {
    pub fn phone(&self) -> Option<String> {
        non_empty(&self.phone)
    }

    pub fn email(&self) -> Option<String> {
        non_empty(&self.email)
    }

    pub fn has_contact(&self) -> bool {
        self.phone().is_some() || self.email().is_some()
    }

    /// Build the ingestion payload; fails locally when no contact was given.
    pub fn to_request(&self, still: &StillImage, background_id: Option<&str>) -> Result<CaptureRequest, SubmitError> {
        if !self.has_contact() {
            return Err(SubmitError::MissingContact);
        }
        Ok(CaptureRequest {
            photo_base64: still.to_base64(),
            phone: self.phone(),
            email: self.email(),
            background_id: background_id.map(str::to_string),
        })
    }
}

/// Ingest the capture, then (if a phone was given) ask for an SMS.
/// The SMS call is best effort: its failure is logged and never returned.
pub fn deliver(service: &dyn KioskService, request: &CaptureRequest) -> Result<CaptureReceipt, SubmitError> {
    let receipt = service.submit_capture(request).map_err(|e| {
        tracing::error!(error = %e, "capture ingestion failed");
        SubmitError::Ingestion(e)
    })?;
    tracing::info!(capture_id = %receipt.id, "capture ingested");

    if let Some(phone) = &request.phone {
        let sms = SmsRequest { capture_id: receipt.id.clone(), phone: phone.clone() };
        match service.trigger_sms(&sms) {
            Ok(()) => tracing::info!(capture_id = %receipt.id, "sms requested"),
            Err(e) => tracing::warn!(capture_id = %receipt.id, error = %e, "sms trigger failed, ignoring"),
        }
    }
    Ok(receipt)
}

/// Synchronous submit: validate, then deliver.
pub fn submit(
    service: &dyn KioskService,
    form: &ContactForm,
    still: &StillImage,
    background_id: Option<&str>,
) -> Result<CaptureReceipt, SubmitError> {
    let request = form.to_request(still, background_id)?;
    deliver(service, &request)
}

#[derive(Debug, Default)]
pub enum SubmissionStatus {
    #[default]
    Editing,
    Sending,
    Failed(String),
    Sent(CaptureReceipt),
}

/// Contact form + in-flight request for the Captured screen.
/// Delivery runs on a worker thread so the live loop keeps ticking.
#[derive(Default)]
pub struct SubmissionFlow {
    pub form: ContactForm,
    focus: Field,
    status: SubmissionStatus,
    pending: Option<Receiver<Result<CaptureReceipt, SubmitError>>>,
}

impl SubmissionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    pub fn is_sending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn switch_field(&mut self) {
        self.focus = match self.focus {
            Field::Phone => Field::Email,
            Field::Email => Field::Phone,
        };
    }

    /// Append typed characters to the focused field.
    /// Phone accepts digits and `+ -()` / spaces; email any printable non-space.
    pub fn type_chars(&mut self, typed: &str) {
        if self.is_sending() {
            return;
        }
        let (field, allowed): (&mut String, fn(char) -> bool) = match self.focus {
            Field::Phone => (&mut self.form.phone, |c| c.is_ascii_digit() || "+-() ".contains(c)),
            Field::Email => (&mut self.form.email, |c| !c.is_whitespace() && !c.is_control()),
        };
        for c in typed.chars().filter(|&c| allowed(c)) {
            if field.chars().count() >= MAX_FIELD_LEN {
                break;
            }
            field.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.is_sending() {
            return;
        }
        match self.focus {
            Field::Phone => self.form.phone.pop(),
            Field::Email => self.form.email.pop(),
        };
    }

    /// Validate and start delivering in the background.
    /// Missing contact info is rejected here without touching the network.
    pub fn start(
        &mut self,
        service: Arc<dyn KioskService>,
        still: &StillImage,
        background_id: Option<&str>,
    ) -> Result<(), SubmitError> {
        if self.is_sending() {
            return Ok(());
        }
        let request = match self.form.to_request(still, background_id) {
            Ok(request) => request,
            Err(e) => return self.fail(e),
        };

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("capture-submit".into())
            .spawn(move || {
                let _ = tx.send(deliver(service.as_ref(), &request));
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "could not start submission worker");
            return self.fail(SubmitError::Ingestion(Error::Io(e)));
        }

        self.pending = Some(rx);
        self.status = SubmissionStatus::Sending;
        Ok(())
    }

    /// Every rejected attempt leaves a message on screen.
    fn fail(&mut self, err: SubmitError) -> Result<(), SubmitError> {
        self.status = SubmissionStatus::Failed(err.to_string());
        Err(err)
    }

    /// Pick up a finished delivery. On failure the form stays filled in for a retry.
    pub fn poll(&mut self) -> Option<&SubmissionStatus> {
        let rx = self.pending.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(SubmitError::WorkerLost),
        };
        self.pending = None;
        self.status = match result {
            Ok(receipt) => SubmissionStatus::Sent(receipt),
            Err(e) => SubmissionStatus::Failed(e.to_string()),
        };
        Some(&self.status)
    }

    /// Clear everything for the next visitor.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
