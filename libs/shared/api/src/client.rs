use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::envelope::{ApiEnvelope, ApiResponse};
use shared_models::error::{AppError, NETWORK_FAILURE_MESSAGE};
use shared_storage::{SharedStorage, TOKEN_KEY};

pub const MISSING_TOKEN_MESSAGE: &str = "Please log in to continue";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Public,
    /// Attach `Authorization: Bearer <token>` read from persisted storage.
    Bearer,
}

/// Thin client over the booking backend. Holds no session state: the bearer
/// token is read from storage on every authenticated call and nothing is
/// retried.
#[derive(Clone)]
pub struct MedicalApiClient {
    client: Client,
    base_url: String,
    storage: SharedStorage,
}

impl MedicalApiClient {
    pub fn new(config: &AppConfig, storage: SharedStorage) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().unwrap_or_else(|e| {
            error!("Failed to build configured HTTP client, using defaults: {}", e);
            Client::new()
        });

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            storage,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    fn bearer_token(&self) -> Result<String, AppError> {
        match self.storage.get_item(TOKEN_KEY)? {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(AppError::Auth(MISSING_TOKEN_MESSAGE.to_string())),
        }
    }

    fn get_headers(&self, auth: AuthMode) -> Result<HeaderMap, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if auth == AuthMode::Bearer {
            let token = self.bearer_token()?;
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| AppError::Auth("Stored token is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
        auth: AuthMode,
    ) -> Result<ApiResponse<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {} with {} query params", method, url, query.len());

        let headers = self.get_headers(auth)?;

        let mut req = self.client.request(method, &url).headers(headers);

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            AppError::Network(NETWORK_FAILURE_MESSAGE.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Reading response from {} failed: {}", url, e);
            AppError::Network(NETWORK_FAILURE_MESSAGE.to_string())
        })?;

        if !status.is_success() {
            return Err(AppError::from_status(status.as_u16(), envelope_message(&text)));
        }

        let envelope: ApiEnvelope<Value> = if text.trim().is_empty() {
            ApiEnvelope {
                success: true,
                status_code: Some(status.as_u16()),
                message: None,
                data: None,
                page: None,
                limit: None,
                total: None,
                total_pages: None,
            }
        } else {
            serde_json::from_str(&text)?
        };

        if !envelope.success {
            return Err(AppError::from_status(
                envelope.status_code.filter(|code| *code >= 400).unwrap_or(400),
                envelope.message,
            ));
        }

        let pagination = envelope.pagination();
        let data = serde_json::from_value::<T>(envelope.data.unwrap_or(Value::Null))?;

        Ok(ApiResponse {
            message: envelope.message,
            data,
            pagination,
        })
    }

    pub async fn get<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: AuthMode,
    ) -> Result<ApiResponse<T>, AppError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, query, None, auth).await
    }

    pub async fn post<T>(&self, path: &str, body: Value, auth: AuthMode) -> Result<ApiResponse<T>, AppError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, &[], Some(body), auth).await
    }

    pub async fn patch<T>(&self, path: &str, body: Value, auth: AuthMode) -> Result<ApiResponse<T>, AppError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, path, &[], Some(body), auth).await
    }
}

fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
