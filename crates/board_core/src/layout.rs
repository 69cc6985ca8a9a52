use shared::domain::{SectionId, SessionId};

use crate::render::ScheduleSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardNode {
    Card(SessionId),
    /// Marks where the dragged card would land if dropped now.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardColumn {
    pub section_id: SectionId,
    pub title: String,
    pub nodes: Vec<BoardNode>,
}

/// The element tree the drag protocol manipulates.
pub trait DropSurface {
    /// Removes every placeholder on the whole board. Returns how many went.
    fn purge_placeholders(&mut self) -> usize;
    fn insert_placeholder_after(&mut self, card: &SessionId) -> bool;
    fn insert_placeholder_at_start(&mut self, section_id: &SectionId) -> bool;
    fn has_placeholder(&self) -> bool;
    /// Moves `card` to the placeholder's position, consuming the
    /// placeholder. Returns the section the card now belongs to.
    fn move_to_placeholder(&mut self, card: &SessionId) -> Option<SectionId>;
    fn section_of(&self, card: &SessionId) -> Option<SectionId>;
    fn set_dragging(&mut self, card: Option<&SessionId>);
}

/// In-memory board: ordered columns of ordered cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardLayout {
    columns: Vec<BoardColumn>,
    dragging: Option<SessionId>,
}

impl BoardLayout {
    pub fn new(columns: Vec<BoardColumn>) -> Self {
        Self {
            columns,
            dragging: None,
        }
    }

    pub fn from_snapshot(snapshot: &ScheduleSnapshot) -> Self {
        Self::new(
            snapshot
                .columns
                .iter()
                .map(|column| BoardColumn {
                    section_id: column.section.id.clone(),
                    title: column.section.name.clone(),
                    nodes: column
                        .sessions
                        .iter()
                        .map(|session| BoardNode::Card(session.id.clone()))
                        .collect(),
                })
                .collect(),
        )
    }

    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    pub fn dragging(&self) -> Option<&SessionId> {
        self.dragging.as_ref()
    }

    pub fn placeholder_count(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|column| &column.nodes)
            .filter(|node| matches!(node, BoardNode::Placeholder))
            .count()
    }

    /// Cards of a column in display order, placeholders excluded.
    pub fn card_order(&self, section_id: &SectionId) -> Vec<SessionId> {
        self.columns
            .iter()
            .find(|column| &column.section_id == section_id)
            .map(|column| {
                column
                    .nodes
                    .iter()
                    .filter_map(|node| match node {
                        BoardNode::Card(id) => Some(id.clone()),
                        BoardNode::Placeholder => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn position_of(&self, wanted: &BoardNode) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(col, column)| {
            column
                .nodes
                .iter()
                .position(|node| node == wanted)
                .map(|idx| (col, idx))
        })
    }
}

impl DropSurface for BoardLayout {
    fn purge_placeholders(&mut self) -> usize {
        let mut removed = 0;
        for column in &mut self.columns {
            let before = column.nodes.len();
            column
                .nodes
                .retain(|node| !matches!(node, BoardNode::Placeholder));
            removed += before - column.nodes.len();
        }
        removed
    }

    fn insert_placeholder_after(&mut self, card: &SessionId) -> bool {
        let Some((col, idx)) = self.position_of(&BoardNode::Card(card.clone())) else {
            return false;
        };
        self.columns[col]
            .nodes
            .insert(idx + 1, BoardNode::Placeholder);
        true
    }

    fn insert_placeholder_at_start(&mut self, section_id: &SectionId) -> bool {
        let Some(column) = self
            .columns
            .iter_mut()
            .find(|column| &column.section_id == section_id)
        else {
            return false;
        };
        column.nodes.insert(0, BoardNode::Placeholder);
        true
    }

    fn has_placeholder(&self) -> bool {
        self.position_of(&BoardNode::Placeholder).is_some()
    }

    fn move_to_placeholder(&mut self, card: &SessionId) -> Option<SectionId> {
        let card_node = BoardNode::Card(card.clone());
        let (card_col, card_idx) = self.position_of(&card_node)?;
        self.position_of(&BoardNode::Placeholder)?;

        self.columns[card_col].nodes.remove(card_idx);
        let (target_col, target_idx) = self.position_of(&BoardNode::Placeholder)?;
        self.columns[target_col].nodes[target_idx] = card_node;
        Some(self.columns[target_col].section_id.clone())
    }

    fn section_of(&self, card: &SessionId) -> Option<SectionId> {
        self.position_of(&BoardNode::Card(card.clone()))
            .map(|(col, _)| self.columns[col].section_id.clone())
    }

    fn set_dragging(&mut self, card: Option<&SessionId>) {
        self.dragging = card.cloned();
    }
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;
