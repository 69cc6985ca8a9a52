use std::collections::HashMap;

use shared::domain::{SectionId, SessionId};
use tracing::debug;

use crate::layout::DropSurface;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DropTarget {
    Card(SessionId),
    /// A column title; dropping here puts the card first in that column.
    Title(SectionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEffect {
    /// The pointer genuinely entered the target; a placeholder was shown.
    Entered,
    /// The pointer genuinely left the target.
    Left,
    /// Crossing of a nested boundary inside a target; nothing to do.
    Nested,
}

/// The platform drag event handed to `drag_over`.
pub trait NativeDragEvent {
    fn prevent_default(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    pub session_id: SessionId,
    pub from_section: SectionId,
    pub to_section: SectionId,
}

impl DropOutcome {
    /// Columns whose order changed, destination first.
    pub fn affected_sections(&self) -> Vec<SectionId> {
        if self.from_section == self.to_section {
            vec![self.to_section.clone()]
        } else {
            vec![self.to_section.clone(), self.from_section.clone()]
        }
    }
}

/// State of the single drag gesture in progress.
///
/// Enter and leave fire once per nested element boundary, so each target
/// keeps an enter-depth counter. Only the 0 -> 1 step counts as entering
/// and only the 1 -> 0 step counts as leaving.
#[derive(Debug, Default)]
pub struct DragController {
    dragged: Option<SessionId>,
    depth: HashMap<DropTarget, u32>,
    placeholder_owner: Option<DropTarget>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dragged(&self) -> Option<&SessionId> {
        self.dragged.as_ref()
    }

    pub fn depth(&self, target: &DropTarget) -> u32 {
        self.depth.get(target).copied().unwrap_or(0)
    }

    pub fn drag_start<S: DropSurface>(&mut self, surface: &mut S, card: SessionId) {
        if let Some(previous) = &self.dragged {
            debug!(%previous, "drag started while another was active; replacing it");
        }
        surface.set_dragging(Some(&card));
        self.dragged = Some(card);
        self.depth.clear();
        self.placeholder_owner = None;
    }

    /// Ignored unless a drag is in progress.
    pub fn drag_enter<S: DropSurface>(&mut self, surface: &mut S, target: DropTarget) -> DragEffect {
        if self.dragged.is_none() {
            return DragEffect::Nested;
        }
        let depth = self.depth.entry(target.clone()).or_insert(0);
        *depth += 1;
        if *depth != 1 {
            return DragEffect::Nested;
        }

        surface.purge_placeholders();
        let inserted = match &target {
            DropTarget::Card(card) => surface.insert_placeholder_after(card),
            DropTarget::Title(section_id) => surface.insert_placeholder_at_start(section_id),
        };
        if inserted {
            self.placeholder_owner = Some(target);
        }
        DragEffect::Entered
    }

    pub fn drag_leave<S: DropSurface>(
        &mut self,
        surface: &mut S,
        target: &DropTarget,
    ) -> DragEffect {
        let Some(depth) = self.depth.get_mut(target).filter(|depth| **depth > 0) else {
            return DragEffect::Nested;
        };
        *depth -= 1;
        if *depth != 0 {
            return DragEffect::Nested;
        }

        // The next target's enter usually fires before this leave; keep its
        // placeholder.
        if self.placeholder_owner.as_ref() == Some(target) {
            surface.purge_placeholders();
            self.placeholder_owner = None;
        }
        DragEffect::Left
    }

    /// Must run for every dragover so the platform keeps the drop enabled.
    pub fn drag_over<E: NativeDragEvent>(&self, event: &mut E) {
        event.prevent_default();
    }

    pub fn drop<S: DropSurface>(&mut self, surface: &mut S) -> Option<DropOutcome> {
        self.finish(surface)
    }

    pub fn drag_end<S: DropSurface>(&mut self, surface: &mut S) -> Option<DropOutcome> {
        self.finish(surface)
    }

    fn finish<S: DropSurface>(&mut self, surface: &mut S) -> Option<DropOutcome> {
        self.depth.clear();
        self.placeholder_owner = None;
        let dragged = self.dragged.take();
        surface.set_dragging(None);

        let Some(card) = dragged else {
            surface.purge_placeholders();
            return None;
        };
        if !surface.has_placeholder() {
            debug!(session_id = %card, "drop outside any target; card stays put");
            return None;
        }

        let from_section = surface.section_of(&card);
        let to_section = surface.move_to_placeholder(&card);
        surface.purge_placeholders();

        match (from_section, to_section) {
            (Some(from_section), Some(to_section)) => {
                debug!(session_id = %card, %from_section, %to_section, "card dropped");
                Some(DropOutcome {
                    session_id: card,
                    from_section,
                    to_section,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
