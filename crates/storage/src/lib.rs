use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use shared::domain::{EventId, Section, SectionId, Session, SessionId};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

mod error;

pub use error::{Collection, StoreError};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Event-scoped cache of sections and sessions backed by SQLite.
///
/// Clones share one connection pool and one initialization latch, so the
/// application can hand copies to every consumer while `init` still runs
/// its setup a single time.
#[derive(Clone)]
pub struct ScheduleStore {
    database_url: Arc<str>,
    pool: Arc<OnceCell<Pool<Sqlite>>>,
    setup_runs: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ScheduleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleStore")
            .field("database_url", &self.database_url)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ScheduleStore {
    /// Creates an uninitialized handle. Nothing touches the database until
    /// [`ScheduleStore::init`] runs.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: Arc::from(database_url.into()),
            pool: Arc::new(OnceCell::new()),
            setup_runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shorthand for `new` followed by `init`.
    pub async fn connect(database_url: impl Into<String>) -> StoreResult<Self> {
        let store = Self::new(database_url);
        store.init().await?;
        Ok(store)
    }

    /// Opens the pool and applies migrations. Safe to call any number of
    /// times from any clone; only the first successful call does work.
    /// A closed store stays closed: `init` after `close` is an error.
    pub async fn init(&self) -> StoreResult<()> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                self.setup_runs.fetch_add(1, Ordering::SeqCst);
                ensure_sqlite_parent_dir_exists(&self.database_url)?;

                let connect_options =
                    SqliteConnectOptions::from_str(&self.database_url)?.create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(connect_options)
                    .await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!(database_url = %self.database_url, "schedule store initialized");
                Ok::<_, StoreError>(pool)
            })
            .await?;
        if pool.is_closed() {
            return Err(StoreError::StorageUnavailable(
                "store has been closed".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.get().is_some_and(|pool| !pool.is_closed())
    }

    /// Closes the pool. Every later operation fails with `StorageUnavailable`.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!(database_url = %self.database_url, "schedule store closed");
        }
    }

    fn pool(&self) -> StoreResult<&Pool<Sqlite>> {
        match self.pool.get() {
            Some(pool) if !pool.is_closed() => Ok(pool),
            Some(_) => Err(StoreError::StorageUnavailable(
                "store has been closed".to_string(),
            )),
            None => Err(StoreError::StorageUnavailable(
                "store used before init".to_string(),
            )),
        }
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(self.pool()?)
            .await?;
        Ok(())
    }

    pub async fn add_section(&self, event_id: &EventId, section: &Section) -> StoreResult<()> {
        async {
            let result = sqlx::query(
                "INSERT INTO sections (event_id, id, name, sort_order, date)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(event_id, id) DO NOTHING",
            )
            .bind(event_id.as_str())
            .bind(section.id.as_str())
            .bind(section.name.as_str())
            .bind(section.order)
            .bind(section.date.as_deref())
            .execute(self.pool()?)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::DuplicateKey {
                    collection: Collection::Sections,
                    event_id: event_id.clone(),
                    id: section.id.0.clone(),
                });
            }
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(|err| log_failure("add_section", event_id, section.id.as_str(), err))
    }

    /// Inserts or replaces the section stored under `(event_id, section.id)`.
    pub async fn put_section(&self, event_id: &EventId, section: &Section) -> StoreResult<()> {
        async {
            let mut conn = self.pool()?.acquire().await?;
            upsert_section(&mut conn, event_id, section).await
        }
        .await
        .inspect_err(|err| log_failure("put_section", event_id, section.id.as_str(), err))
    }

    pub async fn get_section(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
    ) -> StoreResult<Option<Section>> {
        async {
            let row = sqlx::query(
                "SELECT event_id, id, name, sort_order, date
                 FROM sections
                 WHERE event_id = ? AND id = ?",
            )
            .bind(event_id.as_str())
            .bind(section_id.as_str())
            .fetch_optional(self.pool()?)
            .await?;
            row.as_ref().map(section_from_row).transpose()
        }
        .await
        .inspect_err(|err| log_failure("get_section", event_id, section_id.as_str(), err))
    }

    /// All sections of the event, by ascending `order` then `id`.
    pub async fn get_all_sections(&self, event_id: &EventId) -> StoreResult<Vec<Section>> {
        async {
            let rows = sqlx::query(
                "SELECT event_id, id, name, sort_order, date
                 FROM sections
                 WHERE event_id = ?
                 ORDER BY sort_order ASC, id ASC",
            )
            .bind(event_id.as_str())
            .fetch_all(self.pool()?)
            .await?;
            rows.iter().map(section_from_row).collect::<StoreResult<Vec<_>>>()
        }
        .await
        .inspect_err(|err| log_failure("get_all_sections", event_id, "*", err))
    }

    pub async fn delete_section(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
    ) -> StoreResult<()> {
        async {
            let removed = sqlx::query("DELETE FROM sections WHERE event_id = ? AND id = ?")
                .bind(event_id.as_str())
                .bind(section_id.as_str())
                .execute(self.pool()?)
                .await?
                .rows_affected();
            debug!(%event_id, %section_id, removed, "section delete");
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(|err| log_failure("delete_section", event_id, section_id.as_str(), err))
    }

    /// Rewrites `order` to each section's position in `sections` and persists
    /// the whole list in one transaction. Returns the records as written.
    /// A repeated id keeps its first position; later repeats are dropped.
    pub async fn reorder_sections(
        &self,
        event_id: &EventId,
        sections: &[Section],
    ) -> StoreResult<Vec<Section>> {
        async {
            let mut tx = self.pool()?.begin().await?;
            let mut reordered = Vec::with_capacity(sections.len());
            let mut seen = HashSet::new();
            for section in sections.iter().filter(|section| seen.insert(&section.id)) {
                let mut section = section.clone();
                section.event_id = event_id.clone();
                section.order = dense_order(reordered.len());
                upsert_section(&mut tx, event_id, &section).await?;
                reordered.push(section);
            }
            tx.commit().await?;
            debug!(%event_id, count = reordered.len(), "sections reordered");
            Ok::<_, StoreError>(reordered)
        }
        .await
        .inspect_err(|err| log_failure("reorder_sections", event_id, "*", err))
    }

    pub async fn add_session(&self, event_id: &EventId, session: &Session) -> StoreResult<()> {
        async {
            let result = sqlx::query(
                "INSERT INTO sessions (event_id, id, section_id, name, description, sort_order, tags, speakers)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(event_id, id) DO NOTHING",
            )
            .bind(event_id.as_str())
            .bind(session.id.as_str())
            .bind(session.section_id.as_str())
            .bind(session.name.as_str())
            .bind(session.description.as_str())
            .bind(session.order)
            .bind(serde_json::to_string(&session.tags)?)
            .bind(serde_json::to_string(&session.speakers)?)
            .execute(self.pool()?)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::DuplicateKey {
                    collection: Collection::Sessions,
                    event_id: event_id.clone(),
                    id: session.id.0.clone(),
                });
            }
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(|err| log_failure("add_session", event_id, session.id.as_str(), err))
    }

    pub async fn put_session(&self, event_id: &EventId, session: &Session) -> StoreResult<()> {
        async {
            let mut conn = self.pool()?.acquire().await?;
            upsert_session(&mut conn, event_id, session).await
        }
        .await
        .inspect_err(|err| log_failure("put_session", event_id, session.id.as_str(), err))
    }

    pub async fn get_session(
        &self,
        event_id: &EventId,
        session_id: &SessionId,
    ) -> StoreResult<Option<Session>> {
        async {
            let row = sqlx::query(
                "SELECT event_id, id, section_id, name, description, sort_order, tags, speakers
                 FROM sessions
                 WHERE event_id = ? AND id = ?",
            )
            .bind(event_id.as_str())
            .bind(session_id.as_str())
            .fetch_optional(self.pool()?)
            .await?;
            row.as_ref().map(session_from_row).transpose()
        }
        .await
        .inspect_err(|err| log_failure("get_session", event_id, session_id.as_str(), err))
    }

    /// Sessions of one section, by ascending `order` then `id`. An unknown
    /// section yields an empty list.
    pub async fn get_all_sessions_for_section(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
    ) -> StoreResult<Vec<Session>> {
        async {
            let rows = sqlx::query(
                "SELECT event_id, id, section_id, name, description, sort_order, tags, speakers
                 FROM sessions
                 WHERE event_id = ? AND section_id = ?
                 ORDER BY sort_order ASC, id ASC",
            )
            .bind(event_id.as_str())
            .bind(section_id.as_str())
            .fetch_all(self.pool()?)
            .await?;
            rows.iter().map(session_from_row).collect::<StoreResult<Vec<_>>>()
        }
        .await
        .inspect_err(|err| {
            log_failure("get_all_sessions_for_section", event_id, section_id.as_str(), err)
        })
    }

    pub async fn get_all_sessions_for_event(&self, event_id: &EventId) -> StoreResult<Vec<Session>> {
        async {
            let rows = sqlx::query(
                "SELECT event_id, id, section_id, name, description, sort_order, tags, speakers
                 FROM sessions
                 WHERE event_id = ?
                 ORDER BY section_id ASC, sort_order ASC, id ASC",
            )
            .bind(event_id.as_str())
            .fetch_all(self.pool()?)
            .await?;
            rows.iter().map(session_from_row).collect::<StoreResult<Vec<_>>>()
        }
        .await
        .inspect_err(|err| log_failure("get_all_sessions_for_event", event_id, "*", err))
    }

    /// Deletes a session by id, resolving its owning section first. Returns
    /// that section so callers can refresh the affected column.
    pub async fn delete_session(
        &self,
        event_id: &EventId,
        session_id: &SessionId,
    ) -> StoreResult<SectionId> {
        async {
            let pool = self.pool()?;
            let section_id: Option<String> =
                sqlx::query_scalar("SELECT section_id FROM sessions WHERE event_id = ? AND id = ?")
                    .bind(event_id.as_str())
                    .bind(session_id.as_str())
                    .fetch_optional(pool)
                    .await?;
            let Some(section_id) = section_id else {
                return Err(StoreError::NotFound {
                    collection: Collection::Sessions,
                    event_id: event_id.clone(),
                    id: session_id.0.clone(),
                });
            };

            sqlx::query("DELETE FROM sessions WHERE event_id = ? AND section_id = ? AND id = ?")
                .bind(event_id.as_str())
                .bind(section_id.as_str())
                .bind(session_id.as_str())
                .execute(pool)
                .await?;
            Ok::<_, StoreError>(SectionId(section_id))
        }
        .await
        .inspect_err(|err| log_failure("delete_session", event_id, session_id.as_str(), err))
    }

    /// Same contract as [`ScheduleStore::reorder_sections`]; every session is
    /// also moved under `section_id`.
    pub async fn reorder_sessions(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
        sessions: &[Session],
    ) -> StoreResult<Vec<Session>> {
        async {
            let mut tx = self.pool()?.begin().await?;
            let mut reordered = Vec::with_capacity(sessions.len());
            let mut seen = HashSet::new();
            for session in sessions.iter().filter(|session| seen.insert(&session.id)) {
                let mut session = session.clone();
                session.event_id = event_id.clone();
                session.section_id = section_id.clone();
                session.order = dense_order(reordered.len());
                upsert_session(&mut tx, event_id, &session).await?;
                reordered.push(session);
            }
            tx.commit().await?;
            debug!(%event_id, %section_id, count = reordered.len(), "sessions reordered");
            Ok::<_, StoreError>(reordered)
        }
        .await
        .inspect_err(|err| log_failure("reorder_sessions", event_id, section_id.as_str(), err))
    }

    /// Drops every section and session of the event. Returns the number of
    /// sections and sessions removed.
    pub async fn clear_event(&self, event_id: &EventId) -> StoreResult<(u64, u64)> {
        async {
            let mut tx = self.pool()?.begin().await?;

            let sections = sqlx::query("DELETE FROM sections WHERE event_id = ?")
                .bind(event_id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let sessions = sqlx::query("DELETE FROM sessions WHERE event_id = ?")
                .bind(event_id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            tx.commit().await?;
            info!(%event_id, sections, sessions, "event cleared from schedule store");
            Ok::<_, StoreError>((sections, sessions))
        }
        .await
        .inspect_err(|err| log_failure("clear_event", event_id, "*", err))
    }
}

async fn upsert_section(
    conn: &mut SqliteConnection,
    event_id: &EventId,
    section: &Section,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO sections (event_id, id, name, sort_order, date)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(event_id, id) DO UPDATE SET
            name = excluded.name,
            sort_order = excluded.sort_order,
            date = excluded.date,
            updated_at = CURRENT_TIMESTAMP",
    )
    .bind(event_id.as_str())
    .bind(section.id.as_str())
    .bind(section.name.as_str())
    .bind(section.order)
    .bind(section.date.as_deref())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_session(
    conn: &mut SqliteConnection,
    event_id: &EventId,
    session: &Session,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO sessions (event_id, id, section_id, name, description, sort_order, tags, speakers)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(event_id, id) DO UPDATE SET
            section_id = excluded.section_id,
            name = excluded.name,
            description = excluded.description,
            sort_order = excluded.sort_order,
            tags = excluded.tags,
            speakers = excluded.speakers,
            updated_at = CURRENT_TIMESTAMP",
    )
    .bind(event_id.as_str())
    .bind(session.id.as_str())
    .bind(session.section_id.as_str())
    .bind(session.name.as_str())
    .bind(session.description.as_str())
    .bind(session.order)
    .bind(serde_json::to_string(&session.tags)?)
    .bind(serde_json::to_string(&session.speakers)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn section_from_row(row: &SqliteRow) -> StoreResult<Section> {
    Ok(Section {
        id: SectionId(row.try_get("id")?),
        event_id: EventId(row.try_get("event_id")?),
        name: row.try_get("name")?,
        order: row.try_get("sort_order")?,
        date: row.try_get("date")?,
    })
}

fn session_from_row(row: &SqliteRow) -> StoreResult<Session> {
    let tags: String = row.try_get("tags")?;
    let speakers: String = row.try_get("speakers")?;
    Ok(Session {
        id: SessionId(row.try_get("id")?),
        event_id: EventId(row.try_get("event_id")?),
        section_id: SectionId(row.try_get("section_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        order: row.try_get("sort_order")?,
        tags: serde_json::from_str(&tags)?,
        speakers: serde_json::from_str(&speakers)?,
    })
}

fn dense_order(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

fn log_failure(operation: &'static str, event_id: &EventId, key: &str, err: &StoreError) {
    if err.is_not_found() {
        debug!(operation, %event_id, key, "schedule store: {err}");
    } else {
        warn!(operation, %event_id, key, error = %err, "schedule store operation failed");
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> StoreResult<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
