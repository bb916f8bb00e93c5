use crate::calendar::{date_key, MonthContext};
use crate::config::ClientConfig;
use crate::errors::SyncError;
use crate::models::{
    ActivityRecord, DashboardResponse, DashboardStats, LoadResponse, SaveRequest, SaveResponse,
};
use crate::stats::ViewType;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};

/// Remote activity-persistence API.
#[async_trait]
pub trait ActivityApi: Send + Sync {
    async fn load_activities(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, SyncError>;

    /// All-or-nothing from the caller's point of view.
    async fn save_activities(
        &self,
        activities: Vec<ActivityRecord>,
    ) -> Result<Vec<ActivityRecord>, SyncError>;

    async fn dashboard_stats(
        &self,
        view: ViewType,
        month: MonthContext,
    ) -> Result<DashboardStats, SyncError>;
}

#[derive(Debug, Clone)]
pub struct HttpActivityApi {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpActivityApi {
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ActivityApi for HttpActivityApi {
    async fn load_activities(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, SyncError> {
        let response = self
            .client
            .get(self.url("/api/stats"))
            .query(&[("start", date_key(start)), ("end", date_key(end))])
            .send()
            .await?;
        let body: LoadResponse = decode(response).await?;
        if !body.success {
            return Err(rejected(body.message, "Failed to load activities"));
        }
        Ok(body.activities)
    }

    async fn save_activities(
        &self,
        activities: Vec<ActivityRecord>,
    ) -> Result<Vec<ActivityRecord>, SyncError> {
        let response = self
            .client
            .post(self.url("/api/stats"))
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&SaveRequest { activities })
            .send()
            .await?;
        let body: SaveResponse = decode(response).await?;
        if !body.success {
            return Err(rejected(body.message, "Failed to save activities"));
        }
        Ok(body.saved_activities)
    }

    async fn dashboard_stats(
        &self,
        view: ViewType,
        month: MonthContext,
    ) -> Result<DashboardStats, SyncError> {
        let response = self
            .client
            .get(self.url("/api/dashboard/stats"))
            .query(&[
                ("view_type", view.as_str().to_string()),
                ("month", month.month().to_string()),
                ("year", month.year().to_string()),
            ])
            .send()
            .await?;
        let body: DashboardResponse = decode(response).await?;
        match (body.success, body.stats) {
            (true, Some(stats)) => Ok(stats),
            (_, _) => Err(rejected(body.message, "Failed to load dashboard stats")),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));
        return Err(SyncError::ServerRejected(message));
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| SyncError::ServerRejected(format!("invalid response body: {err}")))
}

fn rejected(message: Option<String>, fallback: &str) -> SyncError {
    SyncError::ServerRejected(message.unwrap_or_else(|| fallback.to_string()))
}
