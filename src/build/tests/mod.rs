//! Unit tests for the build engine.

mod sequence;

use std::sync::{Arc, Mutex};

use crate::build::state::BuildState;
use crate::test_support::{FakeProviderClient, RecordingUi, noop_hook};

pub(super) fn state_with(client: &FakeProviderClient) -> BuildState {
    BuildState::new(
        crate::test_support::ssh_profile(),
        Arc::new(client.clone()),
        Arc::new(RecordingUi::default()),
        noop_hook(),
    )
}

pub(super) type EventLog = Arc<Mutex<Vec<String>>>;

pub(super) fn record(log: &EventLog, event: String) {
    if let Ok(mut events) = log.lock() {
        events.push(event);
    }
}

pub(super) fn events_of(log: &EventLog) -> Vec<String> {
    log.lock()
        .map_or_else(|_| Vec::new(), |events| events.clone())
}
