// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the devsync REST endpoints the notification core consumes.

mod routes;

pub use routes::Routes;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::credential::Credentials;
use crate::error::ApiError;
use crate::model::{ActionTarget, Invitation, Notification, NotificationId};

/// Everything a snapshot load needs: server notifications plus the pending
/// invitations that will be presented as notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub notifications: Vec<Notification>,
    pub invitations: Vec<Invitation>,
}

#[derive(Deserialize)]
struct NotificationsResponse {
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
struct InvitationsResponse {
    #[serde(default)]
    invitations: Vec<Invitation>,
}

/// REST client bound to one API base and one credential source.
pub struct ApiClient {
    routes: Routes,
    credentials: Arc<dyn Credentials>,
    client: Client,
}

impl ApiClient {
    pub fn new(routes: Routes, credentials: Arc<dyn Credentials>, timeout: Duration) -> Self {
        crate::install_crypto_provider();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { routes, credentials, client }
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.token() {
            Some(token) => req.header(reqwest::header::AUTHORIZATION, format!("Token {token}")),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let req = self.client.get(url);
        let resp = self.apply_auth(req).send().await?;
        let value = check_status(resp).await?.json().await?;
        Ok(value)
    }

    /// Notifications visible to the current user.
    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let body: NotificationsResponse = self.get_json(&self.routes.notifications()).await?;
        Ok(body.notifications)
    }

    pub async fn notification(&self, id: NotificationId) -> Result<Notification, ApiError> {
        self.get_json(&self.routes.notification(id)).await
    }

    /// Pending invitations addressed to the current user.
    pub async fn invitations(&self) -> Result<Vec<Invitation>, ApiError> {
        let body: InvitationsResponse = self.get_json(&self.routes.invitations()).await?;
        Ok(body.invitations)
    }

    pub async fn accept_invitation(&self, invitation_id: i64) -> Result<serde_json::Value, ApiError> {
        let url = self.routes.accept_invitation(invitation_id);
        self.send_empty(reqwest::Method::POST, &url).await
    }

    pub async fn reject_invitation(&self, invitation_id: i64) -> Result<serde_json::Value, ApiError> {
        let url = self.routes.reject_invitation(invitation_id);
        self.send_empty(reqwest::Method::POST, &url).await
    }

    /// Fetch notifications and invitations concurrently. Fails if either
    /// request fails.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, ApiError> {
        let (notifications, invitations) =
            tokio::try_join!(self.notifications(), self.invitations())?;
        debug!(
            notifications = notifications.len(),
            invitations = invitations.len(),
            "fetched notification snapshot"
        );
        Ok(Snapshot { notifications, invitations })
    }

    /// Perform the network call behind a notification action.
    pub async fn execute(&self, target: &ActionTarget) -> Result<serde_json::Value, ApiError> {
        let raw = target.url.as_deref().ok_or_else(|| ApiError::invalid_target("action has no url"))?;
        let url = self
            .routes
            .resolve(raw)
            .ok_or_else(|| ApiError::invalid_target(format!("cannot resolve action url: {raw}")))?;
        self.send_empty(target.method().into(), &url).await
    }

    async fn send_empty(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let req = self.client.request(method, url);
        let resp = self.apply_auth(req).send().await?;
        let bytes = check_status(resp).await?.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Turn a non-success response into an [`ApiError`], keeping the body text
/// (truncated) as the message.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > 256 {
        let cut = (0..=256).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        body.truncate(cut);
    }
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_owned()
    } else {
        body
    };
    Err(ApiError::from_status(status.as_u16(), message))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
