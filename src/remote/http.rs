//! Blocking HTTP adapter for the control-plane API
//!
//! Thin translation layer between `RemoteClient` and the wire: URL
//! construction, bearer-token header, status-code mapping. Anything
//! smarter (retry, backoff, pagination) belongs to the server contract,
//! not to the sync engine.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::Value;

use super::{DeleteOutcome, RemoteClient};
use crate::codec::DocFormat;
use crate::config::ConnectionConfig;
use crate::document::{extract_revision, RemoteResource};
use crate::error::{LatticeError, LatticeResult};
use crate::registry::EntityKind;
use crate::source::UrlFetcher;

fn unavailable(err: reqwest::Error) -> LatticeError {
    LatticeError::RemoteUnavailable {
        message: err.to_string(),
    }
}

fn bad_status(context: &str, status: StatusCode) -> LatticeError {
    LatticeError::RemoteUnavailable {
        message: format!("unexpected status {status} for {context}"),
    }
}

/// Join a base URL and a path without doubling slashes
fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a content-type header onto a document format
fn format_from_content_type(content_type: &str) -> Option<DocFormat> {
    if content_type.starts_with("application/x-ndjson") {
        Some(DocFormat::NdJson)
    } else if content_type.starts_with("application/json") {
        Some(DocFormat::Json)
    } else if content_type.starts_with("application/yaml") || content_type.starts_with("text/yaml")
    {
        Some(DocFormat::Yaml)
    } else {
        None
    }
}

/// Blocking HTTP client for one control plane
pub struct HttpRemote {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl HttpRemote {
    pub fn new(config: &ConnectionConfig) -> LatticeResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            http,
        })
    }

    fn kind_url(&self, kind: &EntityKind) -> String {
        join_url(
            &self.base_url,
            &format!("apis/{}/{}/{}", kind.group, kind.version, kind.plural_name),
        )
    }

    fn resource_url(&self, kind: &EntityKind, id: &str) -> String {
        format!("{}/{}", self.kind_url(kind), id)
    }

    fn authorized(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn read_resource(
        &self,
        kind: &EntityKind,
        id: &str,
        response: Response,
    ) -> LatticeResult<RemoteResource> {
        let body: Value = response.json().map_err(unavailable)?;
        let revision = extract_revision(&body);
        Ok(RemoteResource {
            kind: kind.kind.clone(),
            id: id.to_string(),
            body,
            revision,
        })
    }
}

impl RemoteClient for HttpRemote {
    fn discover_kinds(&self) -> LatticeResult<Vec<EntityKind>> {
        let url = join_url(&self.base_url, "apis/kinds");
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(bad_status("kind discovery", response.status()));
        }
        response.json().map_err(unavailable)
    }

    fn list(
        &self,
        kind: &EntityKind,
        filters: &[(String, String)],
    ) -> LatticeResult<Vec<RemoteResource>> {
        let response = self
            .authorized(self.http.get(self.kind_url(kind)).query(filters))
            .send()
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(bad_status(&kind.plural_name, response.status()));
        }
        let bodies: Vec<Value> = response.json().map_err(unavailable)?;
        Ok(bodies
            .into_iter()
            .filter_map(|body| RemoteResource::from_body(kind, body))
            .collect())
    }

    fn get(&self, kind: &EntityKind, id: &str) -> LatticeResult<Option<RemoteResource>> {
        let response = self
            .authorized(self.http.get(self.resource_url(kind, id)))
            .send()
            .map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(self.read_resource(kind, id, response)?)),
            status => Err(bad_status(&format!("{}/{id}", kind.plural_name), status)),
        }
    }

    fn create(&self, kind: &EntityKind, body: &Value) -> LatticeResult<RemoteResource> {
        let response = self
            .authorized(self.http.post(self.kind_url(kind)).json(body))
            .send()
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(bad_status(&kind.plural_name, response.status()));
        }
        let created: Value = response.json().map_err(unavailable)?;
        RemoteResource::from_body(kind, created).ok_or_else(|| LatticeError::RemoteUnavailable {
            message: format!("{} create response carried no id", kind.kind),
        })
    }

    fn replace(
        &self,
        kind: &EntityKind,
        id: &str,
        body: &Value,
        expected_revision: Option<&str>,
    ) -> LatticeResult<RemoteResource> {
        let mut builder = self.http.put(self.resource_url(kind, id)).json(body);
        if let Some(revision) = expected_revision {
            builder = builder.header("If-Match", revision);
        }
        let response = self.authorized(builder).send().map_err(unavailable)?;
        match response.status() {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                Err(LatticeError::Conflict {
                    kind: kind.kind.clone(),
                    id: id.to_string(),
                })
            }
            StatusCode::NOT_FOUND => Err(LatticeError::NotFound {
                kind: kind.kind.clone(),
                id: id.to_string(),
            }),
            status if status.is_success() => self.read_resource(kind, id, response),
            status => Err(bad_status(&format!("{}/{id}", kind.plural_name), status)),
        }
    }

    fn merge_patch(
        &self,
        kind: &EntityKind,
        id: &str,
        patch: &Value,
    ) -> LatticeResult<RemoteResource> {
        let response = self
            .authorized(
                self.http
                    .patch(self.resource_url(kind, id))
                    .header("Content-Type", "application/merge-patch+json")
                    .body(serde_json::to_vec(patch)?),
            )
            .send()
            .map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(LatticeError::NotFound {
                kind: kind.kind.clone(),
                id: id.to_string(),
            }),
            status if status.is_success() => self.read_resource(kind, id, response),
            status => Err(bad_status(&format!("{}/{id}", kind.plural_name), status)),
        }
    }

    fn delete(&self, kind: &EntityKind, id: &str) -> LatticeResult<DeleteOutcome> {
        let response = self
            .authorized(self.http.delete(self.resource_url(kind, id)))
            .send()
            .map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            status => Err(bad_status(&format!("{}/{id}", kind.plural_name), status)),
        }
    }

    fn template(&self, kind: &EntityKind) -> LatticeResult<Value> {
        let url = format!("{}/_template", self.kind_url(kind));
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .map_err(unavailable)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(LatticeError::NotFound {
                kind: kind.kind.clone(),
                id: "_template".to_string(),
            }),
            status if status.is_success() => response.json().map_err(unavailable),
            status => Err(bad_status(&kind.plural_name, status)),
        }
    }
}

/// HTTP implementation of the URL document fetcher
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> LatticeResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(unavailable)?;
        Ok(Self { http })
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> LatticeResult<(Vec<u8>, Option<DocFormat>)> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json, application/yaml")
            .send()
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(bad_status(url, response.status()));
        }
        let format = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .and_then(format_from_content_type);
        let bytes = response.bytes().map_err(unavailable)?.to_vec();
        Ok((bytes, format))
    }
}
