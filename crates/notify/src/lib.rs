// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Devsync notify: real-time notification client for the devsync backend.
//!
//! Keeps one push channel open per authenticated session, merges the REST
//! snapshot, live push deltas and pending invitations into a single ordered
//! notification set, and sends read/hide commands back over the channel.

pub mod api;
pub mod codec;
pub mod config;
pub mod console;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod session;
pub mod store;
pub mod supervisor;

use std::sync::Once;

use crate::config::{Cli, Command};

/// Install the rustls crypto provider used by both reqwest and the push
/// channel. Safe to call more than once.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Run one console command until it completes (or until Ctrl-C for `watch`).
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    install_crypto_provider();
    cli.config.validate()?;

    match cli.command {
        Command::Watch => console::watch(&cli.config).await,
        Command::List => console::list(&cli.config).await,
        Command::Status => console::status(&cli.config).await,
        Command::MarkRead { id } => {
            console::send_one(&cli.config, codec::ClientCommand::MarkRead { notification_id: id })
                .await
        }
        Command::MarkAllRead => {
            console::send_one(&cli.config, codec::ClientCommand::MarkAllRead).await
        }
        Command::Hide { id } => {
            console::send_one(&cli.config, codec::ClientCommand::MarkHidden { notification_id: id })
                .await
        }
        Command::HideAll => console::send_one(&cli.config, codec::ClientCommand::MarkAllHidden).await,
    }
}
