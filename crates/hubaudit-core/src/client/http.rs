//! Production adapter: blocking HTTP against the server's REST API.
//!
//! Handles the transport concerns the engine must never see: bearer-token
//! authentication (with re-authentication on expiry), per-request timeouts,
//! bounded retry with exponential backoff on transient statuses, and
//! draining of server-side pagination.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ClientError, DeleteOutcome, InventoryClient};

/// Statuses retried with backoff, GET requests only.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// How the caller proves who they are. De-tangled at the CLI boundary;
/// exactly one variant is ever constructed per run.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiToken(String),
    Password { username: String, password: String },
}

/// Transport tuning, configured once at construction.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub initial_backoff: Duration,
    /// Skip TLS certificate verification (self-signed server installs).
    pub insecure: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            retries: 3,
            initial_backoff: Duration::from_secs(1),
            insecure: false,
        }
    }
}

#[derive(Debug, Clone)]
struct AuthState {
    bearer: String,
    csrf: Option<String>,
}

pub struct HubClient {
    base_url: String,
    http: reqwest::blocking::Client,
    credentials: Credentials,
    options: TransportOptions,
    auth: Mutex<Option<AuthState>>,
}

#[derive(Deserialize)]
struct PagedBody {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(rename = "totalCount")]
    total_count: Option<u64>,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(rename = "bearerToken")]
    bearer_token: String,
}

#[derive(Deserialize)]
struct VersionBody {
    version: String,
}

impl HubClient {
    /// Build the adapter and authenticate eagerly, so credential problems
    /// surface before any analysis work begins.
    pub fn connect(
        base_url: impl Into<String>,
        credentials: Credentials,
        options: TransportOptions,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure)
            .build()
            .map_err(|source| ClientError::Network {
                url: base_url.clone(),
                source,
            })?;

        let client = Self {
            base_url,
            http,
            credentials,
            options,
            auth: Mutex::new(None),
        };
        client.authenticate()?;
        Ok(client)
    }

    fn authenticate(&self) -> Result<(), ClientError> {
        let state = match &self.credentials {
            Credentials::ApiToken(token) => {
                let url = format!("{}/api/tokens/authenticate", self.base_url);
                let response = self
                    .http
                    .post(&url)
                    .header("Authorization", format!("token {token}"))
                    .send()
                    .map_err(|source| ClientError::Network {
                        url: url.clone(),
                        source,
                    })?;

                if response.status().as_u16() == 401 {
                    return Err(ClientError::Unauthorized { url });
                }
                if !response.status().is_success() {
                    return Err(ClientError::Status {
                        status: response.status().as_u16(),
                        url,
                    });
                }

                let csrf = response
                    .headers()
                    .get("X-CSRF-TOKEN")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body: TokenBody =
                    response.json().map_err(|e| ClientError::Decode {
                        url: url.clone(),
                        detail: e.to_string(),
                    })?;
                AuthState {
                    bearer: body.bearer_token,
                    csrf,
                }
            }
            Credentials::Password { username, password } => {
                let url = format!("{}/j_spring_security_check", self.base_url);
                let response = self
                    .http
                    .post(&url)
                    .form(&[("j_username", username.as_str()), ("j_password", password.as_str())])
                    .send()
                    .map_err(|source| ClientError::Network {
                        url: url.clone(),
                        source,
                    })?;

                if response.status().as_u16() == 401 {
                    return Err(ClientError::Unauthorized { url });
                }
                if !response.status().is_success() {
                    return Err(ClientError::Status {
                        status: response.status().as_u16(),
                        url,
                    });
                }

                let cookie = response
                    .headers()
                    .get("Set-Cookie")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ClientError::Decode {
                        url: url.clone(),
                        detail: "no Set-Cookie header on login response".to_string(),
                    })?;
                let bearer = parse_cookie_token(cookie).ok_or_else(|| ClientError::Decode {
                    url: url.clone(),
                    detail: "could not extract session token from cookie".to_string(),
                })?;
                AuthState { bearer, csrf: None }
            }
        };

        info!(server = %self.base_url, "authenticated");
        *self.auth.lock().expect("auth lock poisoned") = Some(state);
        Ok(())
    }

    fn auth_state(&self) -> AuthState {
        self.auth
            .lock()
            .expect("auth lock poisoned")
            .clone()
            .expect("authenticate() runs at construction")
    }

    /// One GET with retry/backoff on transient statuses, plus a single
    /// re-authentication on 401 (bearer tokens expire mid-run).
    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ClientError> {
        let mut backoff = self.options.initial_backoff;
        let mut reauthenticated = false;
        let mut attempt = 0;

        loop {
            let auth = self.auth_state();
            let mut request = self
                .http
                .get(url)
                .header("Authorization", format!("bearer {}", auth.bearer))
                .header("accept", "application/json");
            if let Some(csrf) = &auth.csrf {
                request = request.header("X-CSRF-TOKEN", csrf);
            }

            match request.send() {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        return Ok(response);
                    }
                    if status == 401 && !reauthenticated {
                        warn!(url, "bearer token rejected, re-authenticating");
                        self.authenticate()?;
                        reauthenticated = true;
                        continue;
                    }
                    if RETRYABLE_STATUSES.contains(&status) && attempt < self.options.retries {
                        debug!(url, status, attempt, "transient status, backing off");
                        thread::sleep(backoff);
                        backoff *= 2;
                        attempt += 1;
                        continue;
                    }
                    return Err(ClientError::Status {
                        status,
                        url: url.to_string(),
                    });
                }
                Err(source) => {
                    if attempt < self.options.retries {
                        debug!(url, attempt, error = %source, "network error, backing off");
                        thread::sleep(backoff);
                        backoff *= 2;
                        attempt += 1;
                        continue;
                    }
                    return Err(ClientError::Network {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }

    fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        self.get(url)?.json().map_err(|e| ClientError::Decode {
            url: url.to_string(),
            detail: e.to_string(),
        })
    }

    /// Drain a paginated collection with sequential `limit`/`offset` pages.
    fn drain(&self, collection_url: &str, page_size: usize) -> Result<Vec<Value>, ClientError> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!("{collection_url}?limit={page_size}&offset={offset}");
            let body: PagedBody =
                serde_json::from_value(self.get_json(&url)?).map_err(|e| ClientError::Decode {
                    url: url.clone(),
                    detail: e.to_string(),
                })?;

            let fetched = body.items.len();
            items.extend(body.items);
            offset += fetched;

            let exhausted = fetched == 0
                || fetched < page_size
                || body
                    .total_count
                    .is_some_and(|total| offset as u64 >= total);
            if exhausted {
                return Ok(items);
            }
        }
    }

    fn delete(&self, url: &str) -> Result<DeleteOutcome, ClientError> {
        let auth = self.auth_state();
        let mut request = self
            .http
            .delete(url)
            .header("Authorization", format!("bearer {}", auth.bearer));
        if let Some(csrf) = &auth.csrf {
            request = request.header("X-CSRF-TOKEN", csrf);
        }

        let response = match request.send() {
            Ok(response) => response,
            // The network said nothing definitive; let the caller retry.
            Err(source) => return Ok(DeleteOutcome::TransientFailure(source.to_string())),
        };

        let status = response.status().as_u16();
        let outcome = if response.status().is_success() {
            DeleteOutcome::Deleted
        } else if status == 404 {
            DeleteOutcome::NotFound
        } else if RETRYABLE_STATUSES.contains(&status) {
            DeleteOutcome::TransientFailure(format!("HTTP status {status} from {url}"))
        } else {
            DeleteOutcome::PermanentFailure(format!("HTTP status {status} from {url}"))
        };
        Ok(outcome)
    }
}

/// Pull the session token out of a `Set-Cookie` header value.
fn parse_cookie_token(cookie: &str) -> Option<String> {
    let start = cookie.find('=')? + 1;
    let end = cookie.find(';')?;
    if start > end {
        return None;
    }
    Some(cookie[start..end].to_string())
}

impl InventoryClient for HubClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_version(&self) -> Result<String, ClientError> {
        let url = format!("{}/api/current-version", self.base_url);
        let body: VersionBody =
            serde_json::from_value(self.get_json(&url)?).map_err(|e| ClientError::Decode {
                url,
                detail: e.to_string(),
            })?;
        Ok(body.version)
    }

    fn list_projects(&self, page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{}/api/projects", self.base_url), page_size)
    }

    fn list_versions(
        &self,
        project_url: &str,
        page_size: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{project_url}/versions"), page_size)
    }

    fn list_scans_for_version(
        &self,
        version_url: &str,
        page_size: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{version_url}/codelocations"), page_size)
    }

    fn list_all_scans(&self, page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{}/api/codelocations", self.base_url), page_size)
    }

    fn list_scan_summaries(
        &self,
        scan_url: &str,
        page_size: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{scan_url}/scans"), page_size)
    }

    fn list_policies(&self, page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{}/api/policy-rules", self.base_url), page_size)
    }

    fn list_job_statistics(&self, page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.drain(&format!("{}/api/job-statistics", self.base_url), page_size)
    }

    fn delete_project(&self, project_url: &str) -> Result<DeleteOutcome, ClientError> {
        self.delete(project_url)
    }

    fn delete_version(&self, version_url: &str) -> Result<DeleteOutcome, ClientError> {
        self.delete(version_url)
    }

    fn delete_scan(&self, scan_url: &str) -> Result<DeleteOutcome, ClientError> {
        self.delete(scan_url)
    }
}
