//! HTTP orchestrator client.
//!
//! Speaks a thin pods-style REST contract:
//! - `POST   {base}/api/v1/namespaces/{ns}/workers` — submit a worker
//! - `GET    {base}/api/v1/namespaces/{ns}/workers?labelSelector=k=v,k=v`
//! - `DELETE {base}/api/v1/namespaces/{ns}/workers/{name}`
//!
//! A bearer token is read from a mounted service-account file when
//! configured. The submitted body carries the fixed execution template
//! every extraction worker shares (entrypoint flags for credential
//! mount points, restart policy `never`, read-only cert mounts, the
//! shared drop-directory volume) alongside the per-launch spec.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use churro_core::config::{CertConfig, ClusterConfig};
use churro_core::{ChurroError, Result};

use crate::client::ClusterClient;
use crate::types::{WorkerSpec, WorkerStatus};

/// Name of the shared persistent volume carrying the drop directories.
const DROP_VOLUME: &str = "churro-watch";
/// Entrypoint of the extraction image.
const WORKER_ENTRYPOINT: &str = "/usr/local/bin/churro-extract";

pub struct HttpClusterClient {
    http: reqwest::Client,
    base_url: String,
    namespace: String,
    token_file: Option<PathBuf>,
    certs: CertConfig,
}

/// Wire form of a worker submission.
#[derive(Debug, Serialize)]
struct CreateWorkerBody<'a> {
    #[serde(flatten)]
    spec: &'a WorkerSpec,
    command: Vec<String>,
    restart_policy: &'static str,
    volumes: Vec<VolumeMount>,
}

#[derive(Debug, Serialize)]
struct VolumeMount {
    name: String,
    mount_path: String,
    read_only: bool,
}

#[derive(Debug, Deserialize)]
struct ListWorkersBody {
    #[serde(default)]
    items: Vec<WorkerStatus>,
}

impl HttpClusterClient {
    pub fn new(cluster: &ClusterConfig, namespace: &str, certs: CertConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cluster.base_url.trim_end_matches('/').to_string(),
            namespace: namespace.to_string(),
            token_file: cluster.token_file.clone(),
            certs,
        }
    }

    fn workers_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/workers",
            self.base_url, self.namespace
        )
    }

    /// Attach the bearer token when a token file is mounted.
    async fn authorized(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        match &self.token_file {
            Some(path) => {
                let token = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ChurroError::Cluster(format!(
                        "cannot read cluster token {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(req.bearer_auth(token.trim()))
            }
            None => Ok(req),
        }
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ChurroError::Cluster(format!(
            "{} failed: {} {}",
            what, status, body
        )))
    }
}

/// Render a selector map as `k=v,k=v` for the labelSelector query param.
fn selector_param(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn create_worker(&self, spec: &WorkerSpec) -> Result<()> {
        let body = CreateWorkerBody {
            spec,
            command: vec![
                WORKER_ENTRYPOINT.to_string(),
                "-dbcertpath".to_string(),
                self.certs.db_cert_path.display().to_string(),
                "-servicecertpath".to_string(),
                self.certs.service_cert_path.display().to_string(),
            ],
            // One worker handles exactly one file and exits; a failure
            // must stay visible as a terminal pod, not restart silently.
            restart_policy: "never",
            volumes: vec![
                VolumeMount {
                    name: "db-certs".to_string(),
                    mount_path: self.certs.db_cert_path.display().to_string(),
                    read_only: true,
                },
                VolumeMount {
                    name: "service-certs".to_string(),
                    mount_path: self.certs.service_cert_path.display().to_string(),
                    read_only: true,
                },
                VolumeMount {
                    name: DROP_VOLUME.to_string(),
                    mount_path: "/data".to_string(),
                    read_only: false,
                },
            ],
        };

        debug!(worker = %spec.name, "submitting worker");
        let req = self.http.post(self.workers_url()).json(&body);
        let resp = self.authorized(req).await?.send().await.map_err(|e| {
            ChurroError::Cluster(format!("create worker {}: {}", spec.name, e))
        })?;
        Self::check(resp, "create worker").await?;
        Ok(())
    }

    async fn list_workers(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<WorkerStatus>> {
        let req = self
            .http
            .get(self.workers_url())
            .query(&[("labelSelector", selector_param(selector))]);
        let resp = self
            .authorized(req)
            .await?
            .send()
            .await
            .map_err(|e| ChurroError::Cluster(format!("list workers: {}", e)))?;
        let resp = Self::check(resp, "list workers").await?;
        let body: ListWorkersBody = resp
            .json()
            .await
            .map_err(|e| ChurroError::Cluster(format!("decode worker list: {}", e)))?;
        Ok(body.items)
    }

    async fn delete_worker(&self, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.workers_url(), name);
        let req = self.http.delete(url);
        let resp = self
            .authorized(req)
            .await?
            .send()
            .await
            .map_err(|e| ChurroError::Cluster(format!("delete worker {}: {}", name, e)))?;
        Self::check(resp, "delete worker").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_param_is_comma_joined() {
        let sel = BTreeMap::from([
            ("app".to_string(), "churro".to_string()),
            ("service".to_string(), "churro-extract".to_string()),
        ]);
        assert_eq!(selector_param(&sel), "app=churro,service=churro-extract");
    }
}
