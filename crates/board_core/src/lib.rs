//! Client-side core of the schedule board: remote loading, signal fan-out,
//! render coordination, and the drag-and-drop reorder protocol.

pub mod aggregator;
pub mod api;
pub mod auth;
pub mod drag;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod persist;
pub mod render;
pub mod signals;

pub use aggregator::{AggregatorState, LoadAggregator};
pub use api::{HttpScheduleApi, OfflineScheduleApi, ScheduleApi};
pub use auth::{AuthenticatedFetch, RefreshingTokenProvider, StaticTokenProvider, TokenProvider};
pub use drag::{DragController, DragEffect, DropOutcome, DropTarget, NativeDragEvent};
pub use error::FetchError;
pub use layout::{BoardColumn, BoardLayout, BoardNode, DropSurface};
pub use orchestrator::{EventLoadReport, LoadOrchestrator, LoadReport};
pub use persist::persist_drop;
pub use render::{BoardRenderer, BoardView, ColumnView, RenderCoordinator, ScheduleSnapshot};
pub use signals::SignalBus;
