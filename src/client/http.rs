//! # HTTP implementation of [`NodeApi`].
//!
//! Talks to the node's REST API with `reqwest`. Authentication follows the
//! node's convention: HTTP basic auth with an empty user name and the API
//! password, when one is configured.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::api::{
    ChainTip, ClientError, MinerStatus, NodeApi, Peer, WalletInfo, WalletInit,
};

/// Per-request timeout. Generous because a node mid-sync can be slow to
/// answer, but bounded so a hung process cannot stall a poll loop forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct GatewayInfo {
    peers: Vec<Peer>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// `reqwest`-backed node API client.
pub struct HttpClient {
    http: Client,
    base: String,
    password: Option<String>,
}

impl HttpClient {
    /// Creates a client for the node API at `api_addr` (`host:port`).
    pub fn new(api_addr: &str, password: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base: format!("http://{api_addr}"),
            password,
        }
    }

    fn auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.password {
            Some(pw) => req.basic_auth("", Some(pw)),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        // The node reports failures as a JSON message body; fall back to the
        // raw text when it does not.
        let message = match resp.text().await {
            Ok(body) => match serde_json::from_str::<ApiMessage>(&body) {
                Ok(m) => m.message,
                Err(_) => body,
            },
            Err(_) => String::new(),
        };
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ClientError::Unavailable(message));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let req = self.auth(self.http.get(format!("{}{path}", self.base)));
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn post(&self, path: &str, body: Option<serde_json::Value>) -> Result<(), ClientError> {
        let mut req = self.auth(self.http.post(format!("{}{path}", self.base)));
        if let Some(body) = body {
            req = req.json(&body);
        }
        Self::check(req.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl NodeApi for HttpClient {
    async fn wallet(&self) -> Result<WalletInfo, ClientError> {
        self.get_json("/wallet").await
    }

    async fn wallet_init(&self) -> Result<WalletInit, ClientError> {
        let req = self.auth(self.http.post(format!("{}/wallet/init", self.base)));
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json::<WalletInit>().await?)
    }

    async fn wallet_init_seed(&self, seed: &str) -> Result<(), ClientError> {
        self.post("/wallet/init/seed", Some(json!({ "seed": seed })))
            .await
    }

    async fn wallet_unlock(&self, seed: &str) -> Result<(), ClientError> {
        self.post("/wallet/unlock", Some(json!({ "seed": seed })))
            .await
    }

    async fn miner_status(&self) -> Result<MinerStatus, ClientError> {
        self.get_json("/miner").await
    }

    async fn miner_start(&self) -> Result<(), ClientError> {
        self.post("/miner/start", None).await
    }

    async fn miner_stop(&self) -> Result<(), ClientError> {
        self.post("/miner/stop", None).await
    }

    async fn peers(&self) -> Result<Vec<Peer>, ClientError> {
        let info: GatewayInfo = self.get_json("/gateway").await?;
        Ok(info.peers)
    }

    async fn connect_peer(&self, addr: &str) -> Result<(), ClientError> {
        self.post(&format!("/gateway/connect/{addr}"), None).await
    }

    async fn chain_tip(&self) -> Result<ChainTip, ClientError> {
        self.get_json("/consensus").await
    }
}
