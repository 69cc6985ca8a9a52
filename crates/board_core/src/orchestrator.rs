use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{domain::EventId, protocol::SignalKind};
use storage::ScheduleStore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{api::ScheduleApi, signals::SignalBus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub written: usize,
    pub skipped: usize,
    /// A newer event became active before this load finished; the rest of
    /// the batch was not written and nothing was signalled.
    pub superseded: bool,
}

impl LoadReport {
    fn superseded() -> Self {
        Self {
            superseded: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLoadReport {
    pub sections: LoadReport,
    pub sessions: LoadReport,
}

/// Fetches an event's sections and sessions, caches them, and announces each
/// half on the signal bus independently.
///
/// Every activation bumps a generation counter. A load whose generation is
/// no longer current stops writing at the next record and never signals.
/// Records it wrote before noticing stay in the cache.
pub struct LoadOrchestrator {
    api: Arc<dyn ScheduleApi>,
    store: ScheduleStore,
    bus: SignalBus,
    generation: AtomicU64,
}

impl LoadOrchestrator {
    pub fn new(api: Arc<dyn ScheduleApi>, store: ScheduleStore, bus: SignalBus) -> Arc<Self> {
        Arc::new(Self {
            api,
            store,
            bus,
            generation: AtomicU64::new(0),
        })
    }

    /// Called by the hosting component whenever its active event changes.
    pub fn on_event_changed(self: &Arc<Self>, event_id: EventId) -> JoinHandle<EventLoadReport> {
        let orchestrator = Arc::clone(self);
        let generation = self.activate(&event_id);
        tokio::spawn(async move { orchestrator.load_generation(&event_id, generation).await })
    }

    /// Makes `event_id` the active event and loads it in the current task.
    pub async fn load_event(&self, event_id: &EventId) -> EventLoadReport {
        let generation = self.activate(event_id);
        self.load_generation(event_id, generation).await
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn activate(&self, event_id: &EventId) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(%event_id, generation, "schedule event activated");
        self.bus.emit(event_id, SignalKind::EventActivated);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    async fn load_generation(&self, event_id: &EventId, generation: u64) -> EventLoadReport {
        let (sections, sessions) = tokio::join!(
            self.load_sections(event_id, generation),
            self.load_sessions(event_id, generation)
        );
        EventLoadReport { sections, sessions }
    }

    async fn load_sections(&self, event_id: &EventId, generation: u64) -> LoadReport {
        let sections = self.api.get_schedule_sections(event_id).await;
        if !self.is_current(generation) {
            info!(%event_id, generation, "discarding superseded section load");
            return LoadReport::superseded();
        }

        let report = persist_batch(
            &sections,
            || self.is_current(generation),
            |section| async move {
                match self.store.put_section(event_id, section).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(%event_id, section_id = %section.id, error = %err, "skipping section that failed to persist");
                        false
                    }
                }
            },
        )
        .await;

        if report.superseded || !self.is_current(generation) {
            info!(%event_id, generation, "section load superseded while persisting");
            return LoadReport {
                superseded: true,
                ..report
            };
        }
        self.bus.emit(event_id, SignalKind::SectionsLoaded);
        report
    }

    async fn load_sessions(&self, event_id: &EventId, generation: u64) -> LoadReport {
        let sessions = self.api.get_schedule_sessions(event_id).await;
        if !self.is_current(generation) {
            info!(%event_id, generation, "discarding superseded session load");
            return LoadReport::superseded();
        }

        let report = persist_batch(
            &sessions,
            || self.is_current(generation),
            |session| async move {
                match self.store.put_session(event_id, session).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(%event_id, session_id = %session.id, error = %err, "skipping session that failed to persist");
                        false
                    }
                }
            },
        )
        .await;

        if report.superseded || !self.is_current(generation) {
            info!(%event_id, generation, "session load superseded while persisting");
            return LoadReport {
                superseded: true,
                ..report
            };
        }
        self.bus.emit(event_id, SignalKind::SessionsLoaded);
        report
    }
}

/// Hands each record to `put` while `is_current` holds. `put` reports
/// whether the record was written.
async fn persist_batch<'r, T, F, Fut>(
    records: &'r [T],
    is_current: impl Fn() -> bool,
    mut put: F,
) -> LoadReport
where
    F: FnMut(&'r T) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut report = LoadReport::default();
    for record in records {
        if !is_current() {
            report.superseded = true;
            break;
        }
        if put(record).await {
            report.written += 1;
        } else {
            report.skipped += 1;
        }
    }
    report
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
