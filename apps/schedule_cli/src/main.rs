use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use board_core::{
    persist_drop, AuthenticatedFetch, BoardLayout, BoardRenderer, BoardView, DragController,
    DropSurface, DropTarget, HttpScheduleApi, LoadOrchestrator, OfflineScheduleApi,
    RefreshingTokenProvider, RenderCoordinator, ScheduleApi, ScheduleSnapshot, SignalBus,
    StaticTokenProvider, TokenProvider,
};
use clap::{Parser, Subcommand};
use shared::{
    domain::{EventId, Section, SectionId, Session, SessionId},
    protocol::{ScheduleSignal, SignalKind},
};
use storage::ScheduleStore;
use tokio::{sync::broadcast, time::timeout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url, Settings};

const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "schedule-board", about = "Event schedule board backed by a local cache")]
struct Cli {
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[arg(long, global = true)]
    access_token: Option<String>,
    #[arg(long, global = true)]
    refresh_token: Option<String>,
    #[arg(long, global = true)]
    log_filter: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch an event from the schedule API, cache it and print the board.
    Sync {
        event_id: String,
        /// Skip the network and render whatever is cached.
        #[arg(long)]
        offline: bool,
    },
    Sections {
        event_id: String,
    },
    Sessions {
        event_id: String,
        #[arg(long)]
        section: Option<String>,
    },
    AddSection {
        event_id: String,
        name: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value_t = 0)]
        order: i64,
        #[arg(long)]
        date: Option<String>,
    },
    AddSession {
        event_id: String,
        section_id: String,
        name: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value_t = 0)]
        order: i64,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Give the listed sections orders 0..n-1 in the order given.
    ReorderSections {
        event_id: String,
        #[arg(required = true)]
        section_ids: Vec<String>,
    },
    /// Drag a card onto a column: after `--after`, or first in the column.
    MoveSession {
        event_id: String,
        session_id: String,
        to_section: String,
        #[arg(long)]
        after: Option<String>,
    },
    DeleteSection {
        event_id: String,
        section_id: String,
    },
    DeleteSession {
        event_id: String,
        session_id: String,
    },
    ClearEvent {
        event_id: String,
    },
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(v) = &self.database_url {
            settings.database_url = v.clone();
        }
        if let Some(v) = &self.api_base_url {
            settings.api_base_url = v.clone();
        }
        if let Some(v) = &self.access_token {
            settings.access_token = Some(v.clone());
        }
        if let Some(v) = &self.refresh_token {
            settings.refresh_token = Some(v.clone());
        }
        if let Some(v) = &self.log_filter {
            settings.log_filter = v.clone();
        }
    }
}

/// Prints each board view to stdout.
struct TerminalRenderer;

impl BoardRenderer for TerminalRenderer {
    fn render(&self, view: BoardView) {
        match view {
            BoardView::Schedule(snapshot) => print_snapshot(&snapshot),
            BoardView::Error { event_id, message } => {
                println!("event {event_id}: schedule unavailable ({message})");
            }
        }
    }
}

fn print_snapshot(snapshot: &ScheduleSnapshot) {
    println!("event {}", snapshot.event_id);
    for column in &snapshot.columns {
        let date = column.section.date.as_deref().unwrap_or("-");
        println!(
            "  [{}] {} (order={}, date={date})",
            column.section.id, column.section.name, column.section.order
        );
        for session in &column.sessions {
            print_session(session, "    ");
        }
    }
}

fn print_session(session: &Session, indent: &str) {
    let speakers = session
        .speakers
        .iter()
        .map(|speaker| speaker.initials.as_str())
        .collect::<Vec<_>>()
        .join(",");
    println!(
        "{indent}{} {} (section={}, order={}) {speakers}",
        session.id, session.name, session.section_id, session.order
    );
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_store(settings: &Settings) -> Result<ScheduleStore> {
    let database_url = prepare_database_url(&settings.database_url)?;
    let store = ScheduleStore::new(database_url.as_str());
    store
        .init()
        .await
        .with_context(|| format!("failed to open schedule store at '{database_url}'"))?;
    Ok(store)
}

fn schedule_api(settings: &Settings, offline: bool) -> Arc<dyn ScheduleApi> {
    if offline || settings.api_base_url.trim().is_empty() {
        return Arc::new(OfflineScheduleApi);
    }

    let tokens: Arc<dyn TokenProvider> = match &settings.refresh_token {
        Some(refresh_token) => Arc::new(RefreshingTokenProvider::new(
            &settings.api_base_url,
            settings.access_token.clone(),
            refresh_token.clone(),
        )),
        None => Arc::new(StaticTokenProvider::new(settings.access_token.clone())),
    };
    Arc::new(HttpScheduleApi::new(AuthenticatedFetch::new(
        settings.api_base_url.clone(),
        tokens,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings();
    cli.apply_overrides(&mut settings);
    init_tracing(&settings);

    let store = open_store(&settings).await?;
    let outcome = run(cli.command, &settings, &store).await;
    store.close().await;
    outcome
}

async fn run(command: Command, settings: &Settings, store: &ScheduleStore) -> Result<()> {
    match command {
        Command::Sync { event_id, offline } => {
            sync_event(store, schedule_api(settings, offline), EventId::new(event_id)).await?;
        }
        Command::Sections { event_id } => {
            for section in store.get_all_sections(&EventId::new(event_id)).await? {
                println!(
                    "{} {} (order={}, date={})",
                    section.id,
                    section.name,
                    section.order,
                    section.date.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Sessions { event_id, section } => {
            let event_id = EventId::new(event_id);
            let sessions = match section {
                Some(section) => {
                    store
                        .get_all_sessions_for_section(&event_id, &SectionId::new(section))
                        .await?
                }
                None => store.get_all_sessions_for_event(&event_id).await?,
            };
            for session in &sessions {
                print_session(session, "");
            }
        }
        Command::AddSection {
            event_id,
            name,
            id,
            order,
            date,
        } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut section = Section::new(event_id.as_str(), id, name, order);
            section.date = date;
            store
                .add_section(&EventId::new(event_id), &section)
                .await?;
            println!("created section_id={}", section.id);
        }
        Command::AddSession {
            event_id,
            section_id,
            name,
            id,
            order,
            description,
        } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut session = Session::new(event_id.as_str(), section_id, id, name, order);
            session.description = description;
            store
                .add_session(&EventId::new(event_id), &session)
                .await?;
            println!("created session_id={}", session.id);
        }
        Command::ReorderSections {
            event_id,
            section_ids,
        } => {
            let event_id = EventId::new(event_id);
            let mut sections = Vec::with_capacity(section_ids.len());
            for id in section_ids {
                let section_id = SectionId::new(id);
                let section = store
                    .get_section(&event_id, &section_id)
                    .await?
                    .with_context(|| format!("unknown section '{section_id}'"))?;
                sections.push(section);
            }
            for section in store.reorder_sections(&event_id, &sections).await? {
                println!("{} order={}", section.id, section.order);
            }
        }
        Command::MoveSession {
            event_id,
            session_id,
            to_section,
            after,
        } => {
            move_session(
                store,
                &EventId::new(event_id),
                SessionId::new(session_id),
                SectionId::new(to_section),
                after.map(SessionId::new),
            )
            .await?;
        }
        Command::DeleteSection {
            event_id,
            section_id,
        } => {
            store
                .delete_section(&EventId::new(event_id), &SectionId::new(section_id.as_str()))
                .await?;
            println!("deleted section_id={section_id}");
        }
        Command::DeleteSession {
            event_id,
            session_id,
        } => {
            let section_id = store
                .delete_session(&EventId::new(event_id), &SessionId::new(session_id.as_str()))
                .await?;
            println!("deleted session_id={session_id} from section_id={section_id}");
        }
        Command::ClearEvent { event_id } => {
            let (sections, sessions) = store.clear_event(&EventId::new(event_id)).await?;
            println!("removed sections={sections} sessions={sessions}");
        }
    }

    Ok(())
}

async fn sync_event(
    store: &ScheduleStore,
    api: Arc<dyn ScheduleApi>,
    event_id: EventId,
) -> Result<()> {
    let bus = SignalBus::default();
    let mut signals = bus.subscribe();
    let coordinator = RenderCoordinator::new(store.clone(), bus.clone(), Arc::new(TerminalRenderer));
    let coordinator_task = coordinator.spawn();
    let orchestrator = LoadOrchestrator::new(api, store.clone(), bus);

    let report = orchestrator
        .on_event_changed(event_id.clone())
        .await
        .context("schedule load task failed")?;
    info!(
        %event_id,
        sections_written = report.sections.written,
        sections_skipped = report.sections.skipped,
        sessions_written = report.sessions.written,
        sessions_skipped = report.sessions.skipped,
        "schedule load finished"
    );

    let rendered = ScheduleSignal::new(event_id.clone(), SignalKind::SectionsRendered);
    let waited = timeout(RENDER_TIMEOUT, async {
        loop {
            match signals.recv().await {
                Ok(signal) if signal == rendered => return Ok(()),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed schedule signals while waiting for render");
                }
                Err(broadcast::error::RecvError::Closed) => bail!("signal bus closed"),
            }
        }
    })
    .await;
    coordinator_task.abort();

    waited.with_context(|| format!("event {event_id} was not rendered in time"))?
}

/// Picks the drop target for `move-session`. `--after` must name a card that
/// is already in `to_section`.
fn drop_target(
    layout: &BoardLayout,
    to_section: SectionId,
    after: Option<SessionId>,
) -> Result<DropTarget> {
    let Some(card) = after else {
        return Ok(DropTarget::Title(to_section));
    };
    match layout.section_of(&card) {
        Some(section_id) if section_id == to_section => Ok(DropTarget::Card(card)),
        Some(section_id) => {
            bail!("session '{card}' is in section '{section_id}', not '{to_section}'")
        }
        None => bail!("unknown session '{card}'"),
    }
}

async fn move_session(
    store: &ScheduleStore,
    event_id: &EventId,
    session_id: SessionId,
    to_section: SectionId,
    after: Option<SessionId>,
) -> Result<()> {
    let snapshot = ScheduleSnapshot::read(store, event_id).await?;
    let mut layout = BoardLayout::from_snapshot(&snapshot);
    let target = drop_target(&layout, to_section, after)?;
    let mut drag = DragController::new();

    drag.drag_start(&mut layout, session_id.clone());
    drag.drag_enter(&mut layout, target.clone());
    let Some(outcome) = drag.drop(&mut layout) else {
        bail!("could not move session '{session_id}' to {target:?}");
    };

    let written = persist_drop(store, event_id, &layout, &outcome).await?;
    for session in written
        .iter()
        .filter(|session| session.section_id == outcome.to_section)
    {
        print_session(session, "");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
