// src/ingest/providers/bsky.rs
//! Bluesky XRPC search client.
//!
//! Logs in with `com.atproto.server.createSession` using an app password and
//! calls `app.bsky.feed.searchPosts` with the access token. A 401 on search
//! triggers one re-login and one retry.
//!
//! Logins are serialized: concurrent searches that find no token wait for the
//! one running login and reuse its token.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::ingest::types::{FetchError, SearchPage, SearchProvider};
use crate::post::{PostRecord, SearchPostsResponse};

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

pub const ENV_HANDLE: &str = "BSKY_HANDLE";
pub const ENV_APP_PASSWORD: &str = "BSKY_APP_PASSWORD";

const CREATE_SESSION: &str = "/xrpc/com.atproto.server.createSession";
const SEARCH_POSTS: &str = "/xrpc/app.bsky.feed.searchPosts";

/// Handle + app password. The password never shows up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Read `BSKY_HANDLE` / `BSKY_APP_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        let identifier = std::env::var(ENV_HANDLE)
            .map_err(|_| anyhow!("Missing {ENV_HANDLE} env var"))?;
        let password = std::env::var(ENV_APP_PASSWORD)
            .map_err(|_| anyhow!("Missing {ENV_APP_PASSWORD} env var"))?;
        if identifier.trim().is_empty() || password.trim().is_empty() {
            anyhow::bail!("{ENV_HANDLE} and {ENV_APP_PASSWORD} must not be empty");
        }
        Ok(Self::new(identifier.trim(), password.trim()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct CreateSessionReq<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResp {
    access_jwt: String,
    did: String,
    handle: String,
}

pub struct BskyClient {
    http: reqwest::Client,
    service_url: String,
    credentials: Credentials,
    timeout: Duration,
    access_jwt: RwLock<Option<String>>,
    login_lock: Mutex<()>,
}

impl BskyClient {
    pub fn new(service_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("bsky-keyword-feed/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            http,
            service_url: service_url.trim_end_matches('/').to_string(),
            credentials,
            timeout,
            access_jwt: RwLock::new(None),
            login_lock: Mutex::new(()),
        })
    }

    /// Create a fresh session and store its access token.
    pub async fn login(&self) -> Result<(), FetchError> {
        let url = format!("{}{}", self.service_url, CREATE_SESSION);
        let resp = self
            .http
            .post(&url)
            .json(&CreateSessionReq {
                identifier: &self.credentials.identifier,
                password: &self.credentials.password,
            })
            .send()
            .await
            .map_err(|e| FetchError::Session(format!("createSession: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Session(format!(
                "createSession returned HTTP {}",
                status.as_u16()
            )));
        }
        let session: CreateSessionResp = resp
            .json()
            .await
            .map_err(|e| FetchError::Session(format!("createSession body: {e}")))?;

        info!(target: "bsky", did = %session.did, handle = %session.handle, "session established");
        *self.access_jwt.write().await = Some(session.access_jwt);
        Ok(())
    }

    async fn access_token(&self) -> Result<String, FetchError> {
        if let Some(token) = self.access_jwt.read().await.clone() {
            return Ok(token);
        }

        let _login = self.login_lock.lock().await;
        // Another search may have logged in while we waited.
        if let Some(token) = self.access_jwt.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.access_jwt
            .read()
            .await
            .clone()
            .ok_or_else(|| FetchError::Session("no access token after login".into()))
    }

    /// Forget `rejected` unless it was already replaced by a newer token.
    async fn invalidate(&self, rejected: &str) {
        let mut slot = self.access_jwt.write().await;
        if slot.as_deref() == Some(rejected) {
            *slot = None;
        }
    }

    async fn send_search(
        &self,
        token: &str,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<reqwest::Response, FetchError> {
        let url = format!("{}{}", self.service_url, SEARCH_POSTS);
        let mut params: Vec<(&str, String)> =
            vec![("q", query.to_string()), ("limit", limit.to_string())];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }
        self.http
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.map_transport(e))
    }

    fn map_transport(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SearchProvider for BskyClient {
    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError> {
        let token = self.access_token().await?;
        let mut resp = self.send_search(&token, query, limit, cursor).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(target: "bsky", "access token rejected, logging in again");
            self.invalidate(&token).await;
            let token = self.access_token().await?;
            resp = self.send_search(&token, query, limit, cursor).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: SearchPostsResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(
            target: "bsky",
            query,
            posts = body.posts.len(),
            has_cursor = body.cursor.is_some(),
            "searchPosts page"
        );

        Ok(SearchPage {
            posts: body.posts.into_iter().map(PostRecord::from).collect(),
            cursor: body.cursor,
        })
    }

    fn name(&self) -> &'static str {
        "bsky"
    }
}
