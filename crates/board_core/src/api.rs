use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use shared::{
    domain::{EventId, Section, Session},
    error::ApiError,
};
use tracing::{debug, warn};

use crate::{auth::AuthenticatedFetch, error::FetchError};

/// Remote source of schedule data. Implementations never fail: any
/// transport or HTTP problem is logged and reported as an empty list so the
/// board keeps rendering from the local cache.
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    async fn get_schedule_sections(&self, event_id: &EventId) -> Vec<Section>;
    async fn get_schedule_sessions(&self, event_id: &EventId) -> Vec<Session>;
}

pub struct OfflineScheduleApi;

#[async_trait]
impl ScheduleApi for OfflineScheduleApi {
    async fn get_schedule_sections(&self, event_id: &EventId) -> Vec<Section> {
        debug!(%event_id, "schedule api offline; no sections fetched");
        Vec::new()
    }

    async fn get_schedule_sessions(&self, event_id: &EventId) -> Vec<Session> {
        debug!(%event_id, "schedule api offline; no sessions fetched");
        Vec::new()
    }
}

pub struct HttpScheduleApi {
    fetch: AuthenticatedFetch,
}

impl HttpScheduleApi {
    pub fn new(fetch: AuthenticatedFetch) -> Self {
        Self { fetch }
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FetchError> {
        let response = self.fetch.fetch(Method::GET, path).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiError>()
                .await
                .map(|body| body.message)
                .unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ScheduleApi for HttpScheduleApi {
    async fn get_schedule_sections(&self, event_id: &EventId) -> Vec<Section> {
        match self
            .fetch_list(&format!("/events/{event_id}/sections"))
            .await
        {
            Ok(sections) => sections,
            Err(err) => {
                warn!(%event_id, error = %err, "failed to fetch schedule sections");
                Vec::new()
            }
        }
    }

    async fn get_schedule_sessions(&self, event_id: &EventId) -> Vec<Session> {
        match self
            .fetch_list(&format!("/events/{event_id}/sessions"))
            .await
        {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(%event_id, error = %err, "failed to fetch schedule sessions");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
