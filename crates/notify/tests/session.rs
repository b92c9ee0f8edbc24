// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle and REST collaborators against the fake backend.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use devsync_notify::api::{ApiClient, Routes};
use devsync_notify::credential::{Credentials, TokenCredentials};
use devsync_notify::dispatch::{ActionOutcome, Delivery};
use devsync_notify::error::ErrorKind;
use devsync_notify::model::{synthesized_id, Action, ActionKind, ActionStyle, ActionTarget, HttpMethod};
use devsync_notify::session::{NotificationSession, SessionUpdate};
use devsync_notify::supervisor::ConnectionStatus;

use support::{invitation_json, notification_json, push_frame, FakeBackend, Seen, RECV_TIMEOUT, TOKEN};

fn credentials(token: &str) -> Arc<dyn Credentials> {
    Arc::new(TokenCredentials::new(Some(token.to_owned())))
}

async fn next_update(session: &mut NotificationSession) -> anyhow::Result<SessionUpdate> {
    tokio::time::timeout(RECV_TIMEOUT, session.next_update())
        .await
        .map_err(|_| anyhow::anyhow!("no session update"))?
        .ok_or_else(|| anyhow::anyhow!("session event stream ended"))
}

fn seed(backend: &FakeBackend) {
    backend.set_notifications(json!([
        notification_json(1, "2025-04-01T10:00:00Z"),
        notification_json(2, "2025-04-02T10:00:00Z"),
    ]));
    backend.set_invitations(json!([invitation_json(100, "2025-03-30T09:00:00Z")]));
}

#[tokio::test]
async fn snapshot_then_push_then_commands() -> anyhow::Result<()> {
    let mut backend = FakeBackend::spawn().await?;
    seed(&backend);

    let mut session = NotificationSession::start(&backend.config(), credentials(TOKEN));
    assert_eq!(next_update(&mut session).await?, SessionUpdate::Connected);
    assert_eq!(session.status(), ConnectionStatus::Connected);

    assert_eq!(session.refresh().await?, 3);
    assert_eq!(session.store().ids(), vec![2, 1, synthesized_id(100)]);
    assert_eq!(session.store().unread_count(), 3);

    backend.push_json(push_frame("NEW", 3, notification_json(3, "2025-04-03T10:00:00Z")));
    let update = next_update(&mut session).await?;
    assert!(matches!(update, SessionUpdate::Created { ref notification } if notification.id == 3));
    assert_eq!(session.store().ids()[0], 3);
    assert_eq!(session.store().unread_count(), 4);

    assert_eq!(session.dispatcher().mark_as_read(3), Delivery::Sent);
    assert_eq!(session.store().unread_count(), 3);
    assert_eq!(
        backend.next_seen().await?,
        Seen::Text(json!({ "type": "mark_as_read", "notification_id": 3 }))
    );

    assert_eq!(session.dispatcher().mark_as_hidden(synthesized_id(100)), Delivery::LocalOnly);
    assert_eq!(session.dispatcher().mark_as_hidden(1), Delivery::Sent);
    assert_eq!(session.store().ids(), vec![3, 2]);
    assert_eq!(
        backend.next_seen().await?,
        Seen::Text(json!({ "type": "mark_as_hidden", "notification_id": 1 }))
    );

    session.shutdown().await;
    assert_eq!(backend.next_seen().await?, Seen::Close(Some((1000, "session closed".to_owned()))));
    Ok(())
}

#[tokio::test]
async fn invitation_actions_hit_invitation_endpoints() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn().await?;
    seed(&backend);
    backend.set_invitations(json!([
        invitation_json(100, "2025-03-30T09:00:00Z"),
        invitation_json(101, "2025-03-29T09:00:00Z"),
    ]));

    let mut session = NotificationSession::start(&backend.config(), credentials(TOKEN));
    session.refresh().await?;

    let accept = session
        .store()
        .get(synthesized_id(100))
        .and_then(|n| n.actions.iter().find(|a| a.style.is_accept()).cloned())
        .ok_or_else(|| anyhow::anyhow!("accept action missing"))?;
    let outcome = session.dispatcher().run_action(synthesized_id(100), &accept).await?;
    assert_eq!(outcome, ActionOutcome::Accepted(json!({ "invitation": 100, "ok": true })));
    assert!(session.store().get(synthesized_id(100)).is_some_and(|n| n.is_read));

    let decline = session
        .store()
        .get(synthesized_id(101))
        .and_then(|n| n.actions.iter().find(|a| !a.style.is_accept()).cloned())
        .ok_or_else(|| anyhow::anyhow!("decline action missing"))?;
    let outcome = session.dispatcher().run_action(synthesized_id(101), &decline).await?;
    assert!(matches!(outcome, ActionOutcome::Declined(_)));
    assert!(!session.store().contains(synthesized_id(101)));

    assert_eq!(
        backend.requests(),
        vec!["/api/v1/invitations/100/accept/".to_owned(), "/api/v1/invitations/101/reject/".to_owned()]
    );
    Ok(())
}

#[tokio::test]
async fn relative_request_action_with_empty_body() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn().await?;
    seed(&backend);
    let mut session = NotificationSession::start(&backend.config(), credentials(TOKEN));
    session.refresh().await?;

    let vote = Action {
        text: "Vote".to_owned(),
        kind: ActionKind::Request,
        style: ActionStyle::Primary,
        target: ActionTarget::new("/api/v1/votings/4/vote/", HttpMethod::Post),
    };
    let outcome = session.dispatcher().run_action(2, &vote).await?;
    assert_eq!(outcome, ActionOutcome::Accepted(serde_json::Value::Null));
    assert_eq!(backend.requests(), vec!["/api/v1/votings/4/vote/".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn server_failure_surfaces_status_and_previous() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn().await?;
    seed(&backend);
    let mut session = NotificationSession::start(&backend.config(), credentials(TOKEN));
    session.refresh().await?;

    let broken = Action {
        text: "Delete".to_owned(),
        kind: ActionKind::Request,
        style: ActionStyle::Danger,
        target: ActionTarget::new("api/v1/broken/", HttpMethod::Post),
    };
    let Err(err) = session.dispatcher().run_action(1, &broken).await else {
        anyhow::bail!("broken endpoint should fail");
    };
    assert_eq!(err.error.kind, ErrorKind::Server);
    assert_eq!(err.error.status, Some(500));
    assert_eq!(err.error.message, "database unavailable");
    assert!(!session.store().contains(1));
    assert_eq!(err.previous.map(|n| n.id), Some(1));
    Ok(())
}

#[tokio::test]
async fn unauthorized_snapshot_is_reported() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn().await?;
    let api = ApiClient::new(Routes::new(&backend.api_url()), credentials("wrong"), Duration::from_secs(5));

    let err = api.fetch_snapshot().await.err();
    assert!(err.as_ref().is_some_and(|e| e.is_unauthorized()), "{err:?}");
    assert_eq!(err.and_then(|e| e.status), Some(401));
    Ok(())
}

#[tokio::test]
async fn session_without_token_works_from_rest_only() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn().await?;
    seed(&backend);
    let mut config = backend.config();
    config.token = None;

    // No credential: the channel never starts and REST is rejected.
    let mut session = NotificationSession::start(&config, Arc::new(TokenCredentials::new(None)));
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert!(session.refresh().await.is_err());
    assert!(session.store().is_empty());
    assert_eq!(backend.connections(), 0);
    Ok(())
}
