use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{
    config::TrafficConfig,
    data_objects::{ApiResponse, SubUserUsage},
    TrafficApiError,
};

#[derive(Clone)]
pub struct TrafficApi {
    config: TrafficConfig,
    client: Arc<Client>,
}

impl TrafficApi {
    pub fn new(config: TrafficConfig) -> Result<Self, TrafficApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|e| TrafficApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &TrafficConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url)
    }

    /// Sends a form-encoded POST to the given endpoint, with the API key added to the form fields.
    pub async fn form_query(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse, TrafficApiError> {
        if !self.config.is_configured() {
            return Err(TrafficApiError::NotConfigured);
        }
        let url = self.url(path);
        trace!("🌐️ Sending form query: {url}");
        let mut form = Vec::with_capacity(params.len() + 1);
        form.push(("key", self.config.api_key.reveal().as_str()));
        form.extend_from_slice(params);
        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TrafficApiError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🌐️ Form query successful. {}", response.status());
            response.json::<ApiResponse>().await.map_err(|e| TrafficApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| TrafficApiError::ResponseError(e.to_string()))?;
            Err(TrafficApiError::QueryError { status, message })
        }
    }

    /// Creates a sub-user with the configured traffic allowance.
    pub async fn add_sub_user(&self, username: &str, password: &str, title: &str) -> Result<(), TrafficApiError> {
        let traffic = self.config.allowance_gb.to_string();
        debug!("🌐️ Creating sub-user {username} ({traffic} GB)");
        let params = [("username", username), ("password", password), ("traffic", traffic.as_str()), ("title", title)];
        let result = self.form_query("addSubUser", &params).await?;
        if !result.is_ok() {
            return Err(TrafficApiError::Rejected { code: result.code, message: result.msg });
        }
        info!("🌐️ Created sub-user {username}");
        Ok(())
    }

    /// Deletes a sub-user. Returns `true` only if the upstream confirmed the deletion.
    pub async fn delete_sub_user(&self, username: &str) -> Result<bool, TrafficApiError> {
        debug!("🌐️ Deleting sub-user {username}");
        let result = self.form_query("delSubUser", &[("username", username)]).await?;
        info!("🌐️ Attempted to delete sub-user {username}. Code {}: {}", result.code, result.msg);
        Ok(result.is_ok())
    }

    /// Fetches usage for a sub-user, or `None` if the upstream does not know about it.
    pub async fn query_sub_user(&self, username: &str) -> Result<Option<SubUserUsage>, TrafficApiError> {
        debug!("🌐️ Querying sub-user {username}");
        let result = self.form_query("querySubUser", &[("username", username)]).await?;
        if !result.is_ok() || !result.data.is_array() {
            return Ok(None);
        }
        let users = serde_json::from_value::<Vec<SubUserUsage>>(result.data)
            .map_err(|e| TrafficApiError::JsonError(e.to_string()))?;
        Ok(users.into_iter().next())
    }
}
