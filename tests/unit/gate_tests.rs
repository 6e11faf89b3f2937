use super::*;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::settings::{LLM_API_KEY, LLM_MODEL, WORKSPACE_BASE};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Save(SaveTicket, SettingsPayload),
    Terminate,
    Record(String, BTreeMap<String, String>),
    NotifyError(String),
}

#[derive(Clone, Default)]
struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    fn saves(&self) -> Vec<(SaveTicket, SettingsPayload)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Save(ticket, payload) => Some((ticket, payload)),
                _ => None,
            })
            .collect()
    }

    fn terminate_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Terminate))
            .count()
    }

    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }
}

struct FakePersistence {
    journal: Journal,
    queued: Rc<RefCell<Vec<SaveCompletion>>>,
}

impl SettingsPersistence for FakePersistence {
    fn save(&mut self, ticket: SaveTicket, payload: SettingsPayload) {
        self.journal.push(Call::Save(ticket, payload));
    }

    fn drain_completions(&mut self) -> Vec<SaveCompletion> {
        std::mem::take(&mut *self.queued.borrow_mut())
    }
}

struct FakeSession(Journal);

impl SessionControl for FakeSession {
    fn terminate(&mut self) {
        self.0.push(Call::Terminate);
    }
}

struct FakeAnalytics(Journal);

impl AnalyticsSink for FakeAnalytics {
    fn record(&mut self, event: &str, fields: &BTreeMap<String, String>) {
        self.0.push(Call::Record(event.to_string(), fields.clone()));
    }
}

struct FakeNotifier(Journal);

impl Notifier for FakeNotifier {
    fn info(&mut self, _id: &str, _message: &str) {}

    fn error(&mut self, _id: &str, message: &str) {
        self.0.push(Call::NotifyError(message.to_string()));
    }
}

struct Harness {
    gate: SubmissionGate,
    journal: Journal,
    queued: Rc<RefCell<Vec<SaveCompletion>>>,
}

fn harness() -> Harness {
    let journal = Journal::default();
    let queued = Rc::new(RefCell::new(Vec::new()));
    let gate = SubmissionGate::new(
        FakePersistence {
            journal: journal.clone(),
            queued: queued.clone(),
        },
        FakeSession(journal.clone()),
        FakeAnalytics(journal.clone()),
        FakeNotifier(journal.clone()),
    );
    Harness {
        gate,
        journal,
        queued,
    }
}

fn scenario_payload() -> SettingsPayload {
    SettingsPayload::new()
        .with(LLM_MODEL, "gpt-4")
        .with(LLM_API_KEY, "abc")
}

fn saving_ticket(status: GateStatus) -> SaveTicket {
    match status {
        GateStatus::Saving(ticket) => ticket,
        other => panic!("expected Saving, got {other:?}"),
    }
}

#[test]
fn submit_outside_session_persists_once_and_never_terminates() {
    let mut h = harness();
    let ticket = saving_ticket(h.gate.submit(scenario_payload(), false).expect("submit"));

    assert_eq!(h.journal.saves().len(), 1);
    let status = h
        .gate
        .resolve(ticket, Ok(()))
        .expect("ticket should be current")
        .expect("save should succeed");

    assert_eq!(
        status,
        GateStatus::Closed {
            session_terminated: false
        }
    );
    assert_eq!(h.journal.saves().len(), 1);
    assert_eq!(h.journal.terminate_count(), 0);
    assert!(!h.gate.is_confirming());
}

#[test]
fn scenario_direct_save_records_redacted_analytics() {
    let mut h = harness();
    let ticket = saving_ticket(h.gate.submit(scenario_payload(), false).expect("submit"));
    assert_eq!(h.journal.saves()[0].1, scenario_payload());

    h.gate.resolve(ticket, Ok(()));

    let recorded = h
        .journal
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Record(event, fields) => Some((event, fields)),
            _ => None,
        })
        .expect("analytics event should be recorded");
    assert_eq!(recorded.0, "settings_saved");
    assert_eq!(recorded.1.get(LLM_API_KEY).map(String::as_str), Some("SET"));
    assert_eq!(recorded.1.get(LLM_MODEL).map(String::as_str), Some("gpt-4"));
    assert!(!recorded.1.contains_key(WORKSPACE_BASE));
}

#[test]
fn saved_event_never_carries_workspace_path() {
    let mut h = harness();
    let payload = scenario_payload().with(WORKSPACE_BASE, "/home/me/workspaces");
    let ticket = saving_ticket(h.gate.submit(payload, false).expect("submit"));
    h.gate.resolve(ticket, Ok(()));

    let fields = h
        .journal
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Record(_, fields) => Some(fields),
            _ => None,
        })
        .expect("analytics event should be recorded");
    assert!(!fields.contains_key(WORKSPACE_BASE));
    assert!(fields.values().all(|value| !value.contains("/home/me")));
}

#[test]
fn submit_inside_session_defers_persistence_until_confirm() {
    let mut h = harness();
    let status = h.gate.submit(scenario_payload(), true).expect("submit");

    assert_eq!(status, GateStatus::AwaitingConfirmation);
    assert!(h.gate.is_confirming());
    assert_eq!(h.gate.held_payload(), Some(&scenario_payload()));
    assert!(h.journal.calls().is_empty());
}

#[test]
fn scenario_confirm_persists_then_terminates_then_closes() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");
    let ticket = saving_ticket(h.gate.confirm().expect("confirm"));

    assert_eq!(h.journal.saves(), vec![(ticket, scenario_payload())]);
    assert_eq!(h.journal.terminate_count(), 0, "terminate must wait for success");
    assert!(h.gate.is_confirming(), "prompt stays open while saving");

    let status = h
        .gate
        .resolve(ticket, Ok(()))
        .expect("ticket should be current")
        .expect("save should succeed");
    assert_eq!(
        status,
        GateStatus::Closed {
            session_terminated: true
        }
    );

    let calls = h.journal.calls();
    let save_idx = calls
        .iter()
        .position(|call| matches!(call, Call::Save(..)))
        .expect("save call");
    let terminate_idx = calls
        .iter()
        .position(|call| matches!(call, Call::Terminate))
        .expect("terminate call");
    assert!(save_idx < terminate_idx);
    assert_eq!(h.journal.terminate_count(), 1);
    assert!(!h.gate.is_confirming());
    assert!(h.gate.held_payload().is_none());
}

#[test]
fn cancel_discards_payload_without_side_effects() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");

    assert_eq!(h.gate.cancel().expect("cancel"), GateStatus::Cancelled);
    assert!(!h.gate.is_confirming());
    assert!(h.gate.held_payload().is_none());
    assert!(h.journal.calls().is_empty());
}

#[test]
fn failed_confirm_keeps_prompt_open_and_never_terminates() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");
    let ticket = saving_ticket(h.gate.confirm().expect("confirm"));

    let err = h
        .gate
        .resolve(ticket, Err(PersistenceFailure::new("network down")))
        .expect("ticket should be current")
        .expect_err("save should fail");

    assert_eq!(
        err,
        GateError::Persistence(PersistenceFailure::new("network down"))
    );
    assert_eq!(h.journal.terminate_count(), 0);
    assert!(h.gate.is_confirming());
    assert_eq!(h.gate.held_payload(), Some(&scenario_payload()));
    assert_eq!(
        h.gate.last_failure().map(|f| f.reason.as_str()),
        Some("network down")
    );
    assert!(
        h.journal
            .calls()
            .contains(&Call::NotifyError("network down".to_string()))
    );
}

#[test]
fn confirm_can_be_retried_after_failure() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");
    let first = saving_ticket(h.gate.confirm().expect("confirm"));
    h.gate
        .resolve(first, Err(PersistenceFailure::new("invalid model")));

    let second = saving_ticket(h.gate.confirm().expect("retry confirm"));
    assert_ne!(first, second);
    h.gate.resolve(second, Ok(()));

    assert_eq!(h.journal.saves().len(), 2);
    assert_eq!(h.journal.terminate_count(), 1);
    assert!(!h.gate.is_confirming());
    assert!(h.gate.last_failure().is_none());
}

#[test]
fn failed_direct_save_keeps_form_open_and_allows_resubmit() {
    let mut h = harness();
    let ticket = saving_ticket(h.gate.submit(scenario_payload(), false).expect("submit"));
    let result = h
        .gate
        .resolve(ticket, Err(PersistenceFailure::new("disk full")))
        .expect("ticket should be current");
    assert!(result.is_err());
    assert!(!h.gate.is_confirming());
    assert!(!h.gate.is_saving());

    assert!(h.gate.submit(scenario_payload(), false).is_ok());
    assert!(
        !h.journal
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Record(..)))
    );
}

#[test]
fn confirm_and_cancel_require_open_prompt() {
    let mut h = harness();
    assert_eq!(h.gate.confirm(), Err(GateError::NotAwaitingConfirmation));
    assert_eq!(h.gate.cancel(), Err(GateError::NotAwaitingConfirmation));
    assert!(h.journal.calls().is_empty());
}

#[test]
fn submit_while_prompt_open_is_rejected() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");
    assert_eq!(
        h.gate.submit(SettingsPayload::new(), false),
        Err(GateError::AwaitingConfirmation)
    );
    assert_eq!(h.gate.held_payload(), Some(&scenario_payload()));
}

#[test]
fn operations_are_rejected_while_save_in_flight() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");
    h.gate.confirm().expect("confirm");

    assert_eq!(h.gate.confirm(), Err(GateError::SaveInFlight));
    assert_eq!(h.gate.cancel(), Err(GateError::SaveInFlight));
    assert_eq!(
        h.gate.submit(scenario_payload(), false),
        Err(GateError::SaveInFlight)
    );
    assert_eq!(h.journal.saves().len(), 1);
}

#[test]
fn stale_ticket_is_ignored() {
    let mut h = harness();
    let ticket = saving_ticket(h.gate.submit(scenario_payload(), false).expect("submit"));
    h.gate.resolve(ticket, Ok(()));

    assert!(h.gate.resolve(ticket, Ok(())).is_none());
    assert_eq!(
        h.journal
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::Record(..)))
            .count(),
        1
    );
}

#[test]
fn poll_applies_completions_from_persistence() {
    let mut h = harness();
    h.gate.submit(scenario_payload(), true).expect("submit");
    let ticket = saving_ticket(h.gate.confirm().expect("confirm"));
    h.queued.borrow_mut().push(SaveCompletion {
        ticket,
        result: Ok(()),
    });

    let outcomes = h.gate.poll();
    assert_eq!(
        outcomes,
        vec![Ok(GateStatus::Closed {
            session_terminated: true
        })]
    );
    assert_eq!(h.journal.terminate_count(), 1);
    assert!(h.gate.poll().is_empty());
}
