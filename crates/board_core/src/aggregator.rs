use shared::{
    domain::EventId,
    protocol::{ScheduleSignal, SignalKind},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    WaitingForSections,
    WaitingForSessions,
    BothReceived,
    Rendered,
}

/// Waits for both the section load and the session load of one event before
/// allowing a single combined render.
///
/// The aggregator pins itself to one event: the first load signal it sees,
/// or the event named by the latest `EventActivated`. Load signals for any
/// other event are dropped, so a late completion for a previous event can
/// never pair with a fresh one.
#[derive(Debug, Default)]
pub struct LoadAggregator {
    active_event: Option<EventId>,
    sections_loaded: bool,
    sessions_loaded: bool,
    rendered: bool,
}

impl LoadAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_event(event_id: EventId) -> Self {
        Self {
            active_event: Some(event_id),
            ..Self::default()
        }
    }

    pub fn active_event(&self) -> Option<&EventId> {
        self.active_event.as_ref()
    }

    pub fn state(&self) -> AggregatorState {
        if self.rendered {
            return AggregatorState::Rendered;
        }
        match (self.sections_loaded, self.sessions_loaded) {
            (true, true) => AggregatorState::BothReceived,
            (true, false) => AggregatorState::WaitingForSessions,
            (false, true) => AggregatorState::WaitingForSections,
            (false, false) => AggregatorState::Idle,
        }
    }

    pub fn reset(&mut self, event_id: EventId) {
        *self = Self::for_event(event_id);
    }

    /// Feeds one signal. Returns the event to render on the transition into
    /// `BothReceived`; every other call returns `None` until the next reset.
    pub fn observe(&mut self, signal: &ScheduleSignal) -> Option<EventId> {
        match signal.kind {
            SignalKind::EventActivated => {
                debug!(event_id = %signal.event_id, "aggregator reset for newly active event");
                self.reset(signal.event_id.clone());
                return None;
            }
            SignalKind::SectionsRendered => return None,
            SignalKind::SectionsLoaded | SignalKind::SessionsLoaded => {}
        }

        match &self.active_event {
            Some(active) if active != &signal.event_id => {
                debug!(
                    active_event = %active,
                    stale_event = %signal.event_id,
                    kind = ?signal.kind,
                    "ignoring load signal for inactive event"
                );
                return None;
            }
            Some(_) => {}
            None => self.active_event = Some(signal.event_id.clone()),
        }

        let before = self.state();
        if signal.kind == SignalKind::SectionsLoaded {
            self.sections_loaded = true;
        } else {
            self.sessions_loaded = true;
        }

        let armed = !matches!(
            before,
            AggregatorState::BothReceived | AggregatorState::Rendered
        );
        if armed && self.state() == AggregatorState::BothReceived {
            return Some(signal.event_id.clone());
        }
        None
    }

    /// Records that the render for `event_id` finished. Ignored if the
    /// aggregator has since moved on to another event.
    pub fn mark_rendered(&mut self, event_id: &EventId) {
        if self.active_event.as_ref() == Some(event_id)
            && self.state() == AggregatorState::BothReceived
        {
            self.rendered = true;
        }
    }
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
