use thiserror::Error;
use tracing::{debug, info};

use crate::analytics::AnalyticsSink;
use crate::notify::Notifier;
use crate::settings::{SETTINGS_SAVED_EVENT, SettingsPayload, analytics_fields};

const SAVE_ERROR_TOAST_ID: &str = "settings-save-error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PersistenceFailure {
    pub reason: String,
}

impl PersistenceFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Failed to save settings: {0}")]
    Persistence(#[from] PersistenceFailure),
    #[error("No settings change is waiting for confirmation")]
    NotAwaitingConfirmation,
    #[error("Confirm or cancel the pending settings change first")]
    AwaitingConfirmation,
    #[error("Settings are already being saved")]
    SaveInFlight,
}

pub type SaveResult = Result<(), PersistenceFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SaveTicket(u64);

impl SaveTicket {
    pub fn id(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCompletion {
    pub ticket: SaveTicket,
    pub result: SaveResult,
}

/// Settings persistence service. `save` must not block; the outcome is
/// reported later through `drain_completions` or handed to
/// [`SubmissionGate::resolve`] by the caller.
pub trait SettingsPersistence {
    fn save(&mut self, ticket: SaveTicket, payload: SettingsPayload);

    fn drain_completions(&mut self) -> Vec<SaveCompletion> {
        Vec::new()
    }
}

/// Fire-and-forget signal that ends the active session.
pub trait SessionControl {
    fn terminate(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Persistence was invoked; the outcome arrives with this ticket.
    Saving(SaveTicket),
    AwaitingConfirmation,
    Cancelled,
    /// The save succeeded and the host should dismiss the form.
    Closed { session_terminated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveOrigin {
    Direct,
    Confirmed,
}

#[derive(Debug)]
struct InFlightSave {
    ticket: SaveTicket,
    origin: SaveOrigin,
    payload: SettingsPayload,
}

/// Decides whether a settings submission is persisted right away or held
/// behind a destructive-action confirmation.
///
/// Invariants:
/// - the confirmation prompt is open only between a submit inside an active
///   session and the user's decision; a successful confirmed save closes it
/// - the session is terminated only after persistence reports success
/// - at most one save is in flight per gate
pub struct SubmissionGate {
    persistence: Box<dyn SettingsPersistence>,
    session: Box<dyn SessionControl>,
    analytics: Box<dyn AnalyticsSink>,
    notifier: Box<dyn Notifier>,
    confirming: bool,
    held: Option<SettingsPayload>,
    in_flight: Option<InFlightSave>,
    last_failure: Option<PersistenceFailure>,
    next_ticket: u64,
}

impl SubmissionGate {
    pub fn new(
        persistence: impl SettingsPersistence + 'static,
        session: impl SessionControl + 'static,
        analytics: impl AnalyticsSink + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self {
            persistence: Box::new(persistence),
            session: Box::new(session),
            analytics: Box::new(analytics),
            notifier: Box::new(notifier),
            confirming: false,
            held: None,
            in_flight: None,
            last_failure: None,
            next_ticket: 1,
        }
    }

    pub fn is_confirming(&self) -> bool {
        self.confirming
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn held_payload(&self) -> Option<&SettingsPayload> {
        self.held.as_ref()
    }

    pub fn last_failure(&self) -> Option<&PersistenceFailure> {
        self.last_failure.as_ref()
    }

    pub fn submit(
        &mut self,
        payload: SettingsPayload,
        session_active: bool,
    ) -> Result<GateStatus, GateError> {
        if self.in_flight.is_some() {
            return Err(GateError::SaveInFlight);
        }
        if self.confirming {
            return Err(GateError::AwaitingConfirmation);
        }
        self.last_failure = None;
        if session_active {
            debug!("settings submit inside active session; awaiting confirmation");
            self.held = Some(payload);
            self.confirming = true;
            return Ok(GateStatus::AwaitingConfirmation);
        }
        Ok(GateStatus::Saving(self.start_save(payload, SaveOrigin::Direct)))
    }

    pub fn confirm(&mut self) -> Result<GateStatus, GateError> {
        if self.in_flight.is_some() {
            return Err(GateError::SaveInFlight);
        }
        if !self.confirming {
            return Err(GateError::NotAwaitingConfirmation);
        }
        let Some(payload) = self.held.clone() else {
            // confirming without a held payload cannot be recovered; reset
            self.confirming = false;
            return Err(GateError::NotAwaitingConfirmation);
        };
        self.last_failure = None;
        Ok(GateStatus::Saving(
            self.start_save(payload, SaveOrigin::Confirmed),
        ))
    }

    pub fn cancel(&mut self) -> Result<GateStatus, GateError> {
        if self.in_flight.is_some() {
            return Err(GateError::SaveInFlight);
        }
        if !self.confirming {
            return Err(GateError::NotAwaitingConfirmation);
        }
        debug!("pending settings change discarded");
        self.held = None;
        self.confirming = false;
        self.last_failure = None;
        Ok(GateStatus::Cancelled)
    }

    /// Applies a persistence outcome. Returns `None` for tickets that do not
    /// belong to the save currently in flight.
    pub fn resolve(
        &mut self,
        ticket: SaveTicket,
        result: SaveResult,
    ) -> Option<Result<GateStatus, GateError>> {
        if self.in_flight.as_ref().map(|save| save.ticket) != Some(ticket) {
            debug!(ticket = ticket.id(), "ignoring stale settings save completion");
            return None;
        }
        let save = self.in_flight.take()?;

        if let Err(failure) = result {
            self.notifier.error(SAVE_ERROR_TOAST_ID, &failure.reason);
            self.last_failure = Some(failure.clone());
            return Some(Err(GateError::Persistence(failure)));
        }

        let session_terminated = save.origin == SaveOrigin::Confirmed;
        if session_terminated {
            info!("settings saved; ending active session");
            self.session.terminate();
            self.held = None;
            self.confirming = false;
        } else {
            info!("settings saved");
        }
        self.analytics
            .record(SETTINGS_SAVED_EVENT, &analytics_fields(&save.payload));
        Some(Ok(GateStatus::Closed { session_terminated }))
    }

    /// Drains completions reported by the persistence service and applies them.
    pub fn poll(&mut self) -> Vec<Result<GateStatus, GateError>> {
        let completions = self.persistence.drain_completions();
        completions
            .into_iter()
            .filter_map(|completion| self.resolve(completion.ticket, completion.result))
            .collect()
    }

    fn start_save(&mut self, payload: SettingsPayload, origin: SaveOrigin) -> SaveTicket {
        let ticket = SaveTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        debug!(ticket = ticket.id(), ?origin, "saving settings");
        self.in_flight = Some(InFlightSave {
            ticket,
            origin,
            payload: payload.clone(),
        });
        self.persistence.save(ticket, payload);
        ticket
    }
}

impl std::fmt::Debug for SubmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionGate")
            .field("confirming", &self.confirming)
            .field("has_held_payload", &self.held.is_some())
            .field("in_flight", &self.in_flight.as_ref().map(|save| save.ticket))
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/unit/gate_tests.rs"]
mod tests;
