// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-parent set of advertised service names (spec §4.3): each entry owns
//! a `listen-<service>` hook shared by reference count across every
//! incoming-role `LinkSession` advertising that service on the same
//! parent.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{error::PppoeError, graph::channel::GraphChannel, hook_name::format_listen_hook};

#[derive(Debug, Clone)]
struct ListenerEntry {
    refs: usize,
}

/// Keyed by service name. Guarded by a `tokio::sync::Mutex` rather than a
/// `DashMap` because every mutation here already runs inside the single
/// per-`ParentIf` event loop iteration (spec §5) — a plain `Mutex` is
/// cheaper and documents that there is no real contention, only the
/// `Send`-across-`.await` requirement to satisfy.
pub struct ListenerSet {
    entries: Mutex<HashMap<String, ListenerEntry>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to `service` on the parent reachable via `csock` at
    /// `node_path`, creating the `listen-<service>` hook on first
    /// subscription.
    pub async fn subscribe<C: GraphChannel>(
        &self,
        channel: &C,
        csock: u32,
        node_path: &str,
        service: &str,
    ) -> Result<(), PppoeError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(service) {
            entry.refs += 1;
            return Ok(());
        }

        let hook = format_listen_hook(service);
        channel
            .send_msg(
                csock,
                node_path,
                crate::graph::channel::CtrlCmd::Listen {
                    hook,
                    service: service.to_string(),
                },
            )
            .await?;

        entries.insert(service.to_string(), ListenerEntry { refs: 1 });
        Ok(())
    }

    /// Unsubscribes one reference to `service`; at zero references the
    /// hook is disconnected and the entry freed.
    pub async fn unsubscribe<C: GraphChannel>(
        &self,
        channel: &C,
        csock: u32,
        node_path: &str,
        service: &str,
    ) -> Result<(), PppoeError> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(service) else {
            return Ok(());
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(());
        }
        entries.remove(service);
        let hook = format_listen_hook(service);
        channel.disconnect(csock, node_path, &hook).await?;
        Ok(())
    }

    pub async fn ref_count(&self, service: &str) -> usize {
        self.entries
            .lock()
            .await
            .get(service)
            .map(|e| e.refs)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}
