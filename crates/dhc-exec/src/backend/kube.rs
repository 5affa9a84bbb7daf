//! Kubernetes `batch/v1` client over the REST API.
//!
//! Talks plain HTTP(S) to `api_server` with an optional bearer token, which covers
//! `kubectl proxy` and token-authenticated API servers with publicly trusted certificates.

use std::{env, time::Duration};

use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{self, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::{debug, trace};

use dhc_core::backend::{
    BackendError, BatchClient, JobEvent, JobManifest, JobStatus, LabelSelector,
};

const ENV_API_SERVER: &str = "DHCORE_KUBE_API";
const ENV_TOKEN: &str = "DHCORE_KUBE_TOKEN";

#[derive(Debug, Clone)]
pub struct KubeConfig {
    pub api_server: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            api_server: "http://127.0.0.1:8001".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl KubeConfig {
    /// Defaults overridden by `DHCORE_KUBE_API` and `DHCORE_KUBE_TOKEN`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(api) = env::var(ENV_API_SERVER) {
            cfg.api_server = api;
        }
        cfg.token = env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty());
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct KubeClient {
    base_url: String,
    http: Client,
}

impl KubeClient {
    pub fn new(config: KubeConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| BackendError::Rejected(format!("invalid token: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            base_url: config.api_server.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        trace!(target: "dhc.exec.kube", %method, %url, "request");
        self.http.request(method, url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        let response = check(builder.send().await.map_err(transport)?, what).await?;
        response.json::<T>().await.map_err(transport)
    }
}

fn jobs_path(namespace: &str) -> String {
    format!("/apis/batch/v1/namespaces/{namespace}/jobs")
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Unavailable(e.to_string())
}

/// Map non-success responses onto the backend error taxonomy.
async fn check(response: Response, what: &str) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, what, body))
}

fn classify(status: StatusCode, what: &str, body: String) -> BackendError {
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(what.to_string()),
        StatusCode::CONFLICT => BackendError::AlreadyExists(what.to_string()),
        StatusCode::TOO_MANY_REQUESTS => BackendError::Unavailable(format!("{what}: {status}")),
        s if s.is_server_error() => BackendError::Unavailable(format!("{what}: {status}")),
        _ => BackendError::Rejected(format!("{what}: {status}: {body}")),
    }
}

#[derive(Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct Named {
    metadata: Meta,
}

#[derive(Deserialize)]
struct Meta {
    name: String,
}

#[derive(Deserialize)]
struct Event {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Job {
    #[serde(default)]
    status: JobState,
}

#[derive(Default, Deserialize)]
struct JobState {
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Events are garbage collected by the cluster; terminal job conditions are folded in so a
/// late poll still sees the outcome.
fn merge_conditions(mut events: Vec<JobEvent>, job: Job) -> Vec<JobEvent> {
    for cond in job.status.conditions.into_iter().filter(|c| c.status == "True") {
        // Failed conditions carry open-ended reasons (PodFailurePolicy, ...);
        // report them under one reason and keep the detail in the message.
        let (reason, message) = match cond.kind.as_str() {
            "Complete" => ("Completed", cond.message.unwrap_or_default()),
            "Failed" => {
                let message = match (cond.reason, cond.message) {
                    (Some(r), Some(m)) => format!("{r}: {m}"),
                    (Some(r), None) => r,
                    (None, m) => m.unwrap_or_default(),
                };
                ("Failed", message)
            }
            _ => continue,
        };
        if !events.iter().any(|e| e.reason == reason) {
            events.push(JobEvent::new(reason, message));
        }
    }
    events
}

#[async_trait]
impl BatchClient for KubeClient {
    async fn create_job(&self, manifest: &JobManifest) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, &jobs_path(manifest.namespace()))
            .json(manifest)
            .send()
            .await
            .map_err(transport)?;
        check(response, manifest.name()).await?;
        debug!(target: "dhc.exec.kube", job = manifest.name(), "job created");
        Ok(())
    }

    async fn job_status(&self, namespace: &str, name: &str) -> Result<JobStatus, BackendError> {
        let job: Job = self
            .get_json(
                self.request(Method::GET, &format!("{}/{name}", jobs_path(namespace))),
                name,
            )
            .await?;

        let events: List<Event> = self
            .get_json(
                self.request(Method::GET, &format!("/api/v1/namespaces/{namespace}/events"))
                    .query(&[("fieldSelector", format!("involvedObject.name={name}"))]),
                name,
            )
            .await?;

        let events = events
            .items
            .into_iter()
            .map(|e| JobEvent::new(e.reason, e.message))
            .collect();
        Ok(JobStatus::new(merge_conditions(events, job)))
    }

    async fn job_logs(&self, namespace: &str, name: &str) -> Result<String, BackendError> {
        let pods: List<Named> = self
            .get_json(
                self.request(Method::GET, &format!("/api/v1/namespaces/{namespace}/pods"))
                    .query(&[("labelSelector", format!("job-name={name}"))]),
                name,
            )
            .await?;

        let mut out = String::new();
        for pod in pods.items {
            let path = format!("/api/v1/namespaces/{namespace}/pods/{}/log", pod.metadata.name);
            let response = self
                .request(Method::GET, &path)
                .send()
                .await
                .map_err(transport)?;
            let text = check(response, &pod.metadata.name)
                .await?
                .text()
                .await
                .map_err(transport)?;
            out.push_str(&text);
        }
        Ok(out)
    }

    async fn list_jobs(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<String>, BackendError> {
        let jobs: List<Named> = self
            .get_json(
                self.request(Method::GET, &jobs_path(namespace))
                    .query(&[("labelSelector", selector.to_string())]),
                namespace,
            )
            .await?;
        Ok(jobs.items.into_iter().map(|j| j.metadata.name).collect())
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, &format!("{}/{name}", jobs_path(namespace)))
            .query(&[("propagationPolicy", "Background")])
            .send()
            .await
            .map_err(transport)?;
        check(response, name).await?;
        debug!(target: "dhc.exec.kube", job = name, "job deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_backend_errors() {
        assert_eq!(
            classify(StatusCode::CONFLICT, "j", String::new()),
            BackendError::AlreadyExists("j".into())
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, "j", String::new()),
            BackendError::NotFound("j".into())
        );
        assert!(classify(StatusCode::SERVICE_UNAVAILABLE, "j", String::new()).is_transient());
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "j", String::new()).is_transient());
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, "j", "bad spec".into()),
            BackendError::Rejected(m) if m.contains("bad spec")
        ));
    }

    #[test]
    fn terminal_conditions_become_events() {
        let job: Job = serde_json::from_str(
            r#"{"status":{"conditions":[
                {"type":"Failed","status":"True","reason":"BackoffLimitExceeded","message":"limit"},
                {"type":"Suspended","status":"True"}
            ]}}"#,
        )
        .unwrap();
        let events = merge_conditions(vec![JobEvent::new("SuccessfulCreate", "")], job);
        let reasons: Vec<&str> = events.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, vec!["SuccessfulCreate", "Failed"]);
        assert_eq!(events[1].message, "BackoffLimitExceeded: limit");

        let job: Job =
            serde_json::from_str(r#"{"status":{"conditions":[{"type":"Complete","status":"True"}]}}"#)
                .unwrap();
        let events = merge_conditions(vec![JobEvent::new("Completed", "done")], job);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn any_failed_condition_is_a_failure_reason() {
        let job: Job = serde_json::from_str(
            r#"{"status":{"conditions":[
                {"type":"Failed","status":"True","reason":"PodFailurePolicy","message":"container exited 42"}
            ]}}"#,
        )
        .unwrap();
        let events = merge_conditions(Vec::new(), job);
        assert_eq!(events.len(), 1);
        assert!(crate::framework::FAILURE_REASONS.contains(&events[0].reason.as_str()));
        assert_eq!(events[0].message, "PodFailurePolicy: container exited 42");

        let job: Job =
            serde_json::from_str(r#"{"status":{"conditions":[{"type":"Failed","status":"True"}]}}"#)
                .unwrap();
        let events = merge_conditions(Vec::new(), job);
        assert_eq!(events[0].reason, "Failed");
        assert!(events[0].message.is_empty());
    }

    #[test]
    fn config_trims_trailing_slash() {
        let client = KubeClient::new(KubeConfig {
            api_server: "http://127.0.0.1:8001/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8001");
    }
}
