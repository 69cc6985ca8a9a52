use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use shared::{
    domain::{EventId, Section, SectionId, Session},
    protocol::{ScheduleSignal, SignalKind},
};
use storage::{ScheduleStore, StoreResult};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, error, info, warn};

use crate::{aggregator::LoadAggregator, signals::SignalBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnView {
    pub section: Section,
    pub sessions: Vec<Session>,
}

/// Everything the board shows for one event, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub event_id: EventId,
    pub columns: Vec<ColumnView>,
}

impl ScheduleSnapshot {
    pub async fn read(store: &ScheduleStore, event_id: &EventId) -> StoreResult<Self> {
        let sections = store.get_all_sections(event_id).await?;
        let sessions = store.get_all_sessions_for_event(event_id).await?;

        let mut by_section: HashMap<SectionId, Vec<Session>> = HashMap::new();
        for session in sessions {
            by_section
                .entry(session.section_id.clone())
                .or_default()
                .push(session);
        }

        let columns = sections
            .into_iter()
            .map(|section| ColumnView {
                sessions: by_section.remove(&section.id).unwrap_or_default(),
                section,
            })
            .collect();

        for (section_id, orphans) in by_section {
            debug!(
                %event_id,
                %section_id,
                count = orphans.len(),
                "skipping sessions whose section is not cached"
            );
        }

        Ok(Self {
            event_id: event_id.clone(),
            columns,
        })
    }

    pub fn session_count(&self) -> usize {
        self.columns.iter().map(|column| column.sessions.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardView {
    Schedule(ScheduleSnapshot),
    /// Shown in place of the board when the cache could not be read.
    Error { event_id: EventId, message: String },
}

pub trait BoardRenderer: Send + Sync {
    fn render(&self, view: BoardView);
}

/// Listens on the signal bus and performs one read-all render pass per
/// event once both loads have landed.
pub struct RenderCoordinator {
    store: ScheduleStore,
    bus: SignalBus,
    renderer: Arc<dyn BoardRenderer>,
    aggregator: Mutex<LoadAggregator>,
}

impl RenderCoordinator {
    pub fn new(
        store: ScheduleStore,
        bus: SignalBus,
        renderer: Arc<dyn BoardRenderer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            bus,
            renderer,
            aggregator: Mutex::new(LoadAggregator::new()),
        })
    }

    /// Returns true when the signal caused a render pass.
    pub async fn handle_signal(&self, signal: &ScheduleSignal) -> bool {
        let trigger = self.aggregator.lock().await.observe(signal);
        let Some(event_id) = trigger else {
            return false;
        };

        self.render_pass(&event_id).await;
        self.aggregator.lock().await.mark_rendered(&event_id);
        true
    }

    pub async fn render_pass(&self, event_id: &EventId) {
        match ScheduleSnapshot::read(&self.store, event_id).await {
            Ok(snapshot) => {
                info!(
                    %event_id,
                    sections = snapshot.columns.len(),
                    sessions = snapshot.session_count(),
                    "rendering schedule board"
                );
                self.renderer.render(BoardView::Schedule(snapshot));
            }
            Err(err) => {
                error!(%event_id, error = %err, "schedule store read failed during render");
                self.renderer.render(BoardView::Error {
                    event_id: event_id.clone(),
                    message: err.to_string(),
                });
            }
        }
        self.bus.emit(event_id, SignalKind::SectionsRendered);
    }

    /// Subscribes before returning, so no signal published after this call is
    /// missed. The task runs until aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let mut signals = self.bus.stream();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(item) = signals.next().await {
                match item {
                    Ok(signal) => {
                        coordinator.handle_signal(&signal).await;
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "render coordinator fell behind the signal bus");
                    }
                }
            }
            debug!("signal bus closed; render coordinator stopped");
        })
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
