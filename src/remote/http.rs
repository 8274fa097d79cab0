use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::logging::{log, log_remote_read, log_remote_write, obj, params_hash, v_str, Domain, Level, TimedScope};
use crate::model::{AuthReply, Task, WageRecord, WorkerEntry};
use crate::remote::{AuthRequest, RemoteStore, WriteAck, WriteChannel, WriteRequest};

/// The spreadsheet script web app: one URL, multiplexed by `action`.
pub struct ScriptEndpoint {
    client: Client,
    base: Url,
}

impl ScriptEndpoint {
    pub fn new(cfg: &Config) -> Result<Self> {
        let raw = cfg
            .script_url
            .as_deref()
            .ok_or_else(|| anyhow!("SCRIPT_URL is not set"))?;
        let base = Url::parse(raw).map_err(|e| anyhow!("invalid SCRIPT_URL {:?}: {}", raw, e))?;
        let client = Client::builder().timeout(cfg.http_timeout()).build()?;
        Ok(Self { client, base })
    }

    fn url_for(&self, action: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Some(action) = action {
            url.query_pairs_mut().append_pair("action", action);
        }
        url
    }

    async fn get_list<T: DeserializeOwned>(&self, action: Option<&str>) -> ClientResult<Vec<T>> {
        let label = action.unwrap_or("records");
        let scope = TimedScope::new(Domain::Remote, "get");
        let resp = self
            .client
            .get(self.url_for(action))
            .send()
            .await
            .map_err(|e| ClientError::transport(label, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::transport(label, format!("HTTP {}", status)));
        }
        let text = resp.text().await.map_err(|e| ClientError::transport(label, e))?;
        let items: Vec<T> = serde_json::from_str(&text).map_err(|e| ClientError::decode(label, e))?;
        log_remote_read(label, status.as_u16(), items.len(), scope.elapsed_ms());
        Ok(items)
    }
}

#[async_trait]
impl RemoteStore for ScriptEndpoint {
    async fn fetch_records(&self) -> ClientResult<Vec<WageRecord>> {
        self.get_list(None).await
    }

    async fn fetch_workers(&self) -> ClientResult<Vec<WorkerEntry>> {
        self.get_list(Some("getWorkers")).await
    }

    async fn fetch_tasks(&self) -> ClientResult<Vec<Task>> {
        self.get_list(Some("getTasks")).await
    }

    async fn authenticate(&self, req: &AuthRequest) -> ClientResult<AuthReply> {
        let action = req.action();
        let resp = self
            .client
            .post(self.base.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(req.body().to_string())
            .send()
            .await
            .map_err(|e| ClientError::transport(action, e))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| ClientError::transport(action, e))?;
        let reply: AuthReply = serde_json::from_str(&text).map_err(|e| ClientError::decode(action, e))?;
        log(
            Level::Debug,
            Domain::Remote,
            "auth_reply",
            obj(&[
                ("action", v_str(action)),
                ("status", json!(status)),
                ("success", json!(reply.success)),
            ]),
        );
        Ok(reply)
    }
}

#[async_trait]
impl WriteChannel for ScriptEndpoint {
    async fn send(&self, req: &WriteRequest) -> ClientResult<WriteAck> {
        let action = req.action();
        let body = req.body().to_string();
        let resp = self
            .client
            .post(self.base.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone())
            .send()
            .await
            .map_err(|e| ClientError::transport(action, e))?;
        // Write replies carry no usable data; only the status is traced.
        log(
            Level::Trace,
            Domain::Remote,
            "write_status",
            obj(&[("action", v_str(action)), ("status", json!(resp.status().as_u16()))]),
        );
        log_remote_write(action, &params_hash(&body), WriteAck::Opaque.as_str());
        Ok(WriteAck::Opaque)
    }
}
