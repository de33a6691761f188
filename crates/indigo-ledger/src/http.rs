//! Ledger service reached over HTTP (an `indigo-node` instance).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::LedgerError;
use crate::service::LedgerService;
use crate::transaction::{LedgerReply, LedgerTransaction, ReadQuery, ReadReply};

pub struct HttpLedgerService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLedgerService {
    /// Service for the node at `base_url`, e.g. `http://127.0.0.1:9700`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LedgerError> {
        Self::with_connect_timeout(base_url, Duration::from_secs(5))
    }

    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| LedgerError::NetworkUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, LedgerError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LedgerError::NetworkUnavailable(format!(
                "{} answered {}",
                url, status
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::InvalidResponse(format!(
                "{} answered {}: {}",
                url, status, text
            )));
        }
        response.json::<R>().await.map_err(map_transport_error)
    }
}

fn map_transport_error(error: reqwest::Error) -> LedgerError {
    if error.is_timeout() {
        LedgerError::Timeout
    } else if error.is_connect() || error.is_request() {
        LedgerError::NetworkUnavailable(error.to_string())
    } else {
        LedgerError::InvalidResponse(error.to_string())
    }
}

#[async_trait]
impl LedgerService for HttpLedgerService {
    async fn submit(&self, txn: &LedgerTransaction) -> Result<LedgerReply, LedgerError> {
        tracing::debug!(url = %self.base_url, req_id = txn.req_id, "posting transaction");
        self.post("/api/v1/ledger/submit", txn).await
    }

    async fn read(&self, query: &ReadQuery) -> Result<ReadReply, LedgerError> {
        self.post("/api/v1/ledger/read", query).await
    }

    fn service_id(&self) -> &str {
        &self.base_url
    }
}
