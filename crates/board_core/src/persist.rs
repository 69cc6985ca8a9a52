use shared::domain::{EventId, Session};
use storage::{ScheduleStore, StoreResult};
use tracing::{info, warn};

use crate::{drag::DropOutcome, layout::BoardLayout};

/// Writes the post-drop order of every affected column back to the store.
///
/// Each column's cards are read from `layout` in display order, looked up in
/// the store and rewritten with dense orders. The destination column is
/// written first so a card that crossed columns gets its new section before
/// the source column is compacted. Returns every session as written.
pub async fn persist_drop(
    store: &ScheduleStore,
    event_id: &EventId,
    layout: &BoardLayout,
    outcome: &DropOutcome,
) -> StoreResult<Vec<Session>> {
    let mut written = Vec::new();
    for section_id in outcome.affected_sections() {
        let mut sessions = Vec::new();
        for session_id in layout.card_order(&section_id) {
            match store.get_session(event_id, &session_id).await? {
                Some(session) => sessions.push(session),
                None => {
                    warn!(%event_id, %section_id, %session_id, "card on the board is not cached; skipping");
                }
            }
        }
        written.extend(store.reorder_sessions(event_id, &section_id, &sessions).await?);
    }

    info!(
        %event_id,
        session_id = %outcome.session_id,
        from_section = %outcome.from_section,
        to_section = %outcome.to_section,
        "drop persisted"
    );
    Ok(written)
}

#[cfg(test)]
#[path = "tests/persist_tests.rs"]
mod tests;
