use serde::{Deserialize, Serialize};

use crate::domain::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// The active event switched; listeners drop state tied to the previous one.
    EventActivated,
    SectionsLoaded,
    SessionsLoaded,
    SectionsRendered,
}

/// Broadcast notification shared by every board component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSignal {
    pub event_id: EventId,
    pub kind: SignalKind,
}

impl ScheduleSignal {
    pub fn new(event_id: EventId, kind: SignalKind) -> Self {
        Self { event_id, kind }
    }

    pub fn is_for(&self, event_id: &EventId) -> bool {
        &self.event_id == event_id
    }
}
