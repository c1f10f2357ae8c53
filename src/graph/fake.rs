// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An in-memory [`GraphChannel`] used by this crate's own tests and
//! available to downstream integration tests that want to drive the
//! subsystem without a real netgraph binding.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use tokio::sync::{Mutex, mpsc};

use crate::{
    error::PppoeError,
    graph::channel::{CtrlCmd, CtrlEvent, DataFrame, GraphChannel, NodeId, SockId},
};

struct SockPair {
    ctrl_tx: mpsc::UnboundedSender<CtrlEvent>,
    ctrl_rx: Mutex<mpsc::UnboundedReceiver<CtrlEvent>>,
    data_tx: mpsc::UnboundedSender<DataFrame>,
    data_rx: Mutex<mpsc::UnboundedReceiver<DataFrame>>,
}

#[derive(Default)]
struct Recorded {
    sent_msgs: Vec<(SockId, String, CtrlCmd)>,
    listen_counts: HashMap<String, u32>,
    disconnects: Vec<(SockId, String, String)>,
    shutdowns: Vec<(SockId, String)>,
    sent_data: Vec<(SockId, String, Vec<u8>)>,
    ifaces_up: Vec<String>,
    kldload_calls: u32,
}

/// An in-memory stand-in for the real netgraph socket API. Every socket
/// id it hands out backs a pair of unbounded channels a test can push
/// events/frames into.
pub struct FakeGraphChannel {
    next_sock: AtomicU32,
    next_node: AtomicU64,
    socks: Mutex<HashMap<SockId, Arc<SockPair>>>,
    recorded: Mutex<Recorded>,
    /// When set, `probe_hook_peer` reports an existing node instead of
    /// requiring a fresh `mkpeer`.
    preexisting_node: Mutex<Option<NodeId>>,
    fail_mkpeer: std::sync::atomic::AtomicBool,
}

impl FakeGraphChannel {
    pub fn new() -> Self {
        Self {
            next_sock: AtomicU32::new(1),
            next_node: AtomicU64::new(1),
            socks: Mutex::new(HashMap::new()),
            recorded: Mutex::new(Recorded::default()),
            preexisting_node: Mutex::new(None),
            fail_mkpeer: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn make_mkpeer_fail(&self) {
        self.fail_mkpeer.store(true, Ordering::SeqCst);
    }

    pub async fn set_preexisting_node(&self, id: NodeId) {
        *self.preexisting_node.lock().await = Some(id);
    }

    /// Pushes a control event that a subsequent `recv_ctrl(csock)` call
    /// will observe.
    pub async fn push_ctrl_event(&self, csock: SockId, event: CtrlEvent) {
        let socks = self.socks.lock().await;
        if let Some(pair) = socks.get(&csock) {
            let _ = pair.ctrl_tx.send(event);
        }
    }

    /// Pushes a data frame that a subsequent `recv_data(dsock)` call will
    /// observe.
    pub async fn push_data_frame(&self, dsock: SockId, frame: DataFrame) {
        let socks = self.socks.lock().await;
        if let Some(pair) = socks.get(&dsock) {
            let _ = pair.data_tx.send(frame);
        }
    }

    pub fn listen_count(&self, service: &str) -> u32 {
        self.recorded
            .try_lock()
            .map(|r| r.listen_counts.get(service).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn sent_data_count(&self) -> usize {
        self.recorded.try_lock().map(|r| r.sent_data.len()).unwrap_or(0)
    }

    pub fn kldload_calls(&self) -> u32 {
        self.recorded.try_lock().map(|r| r.kldload_calls).unwrap_or(0)
    }
}

impl Default for FakeGraphChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphChannel for FakeGraphChannel {
    async fn mk_sock_node(&self) -> Result<(SockId, SockId), PppoeError> {
        let csock = self.next_sock.fetch_add(1, Ordering::SeqCst);
        let dsock = self.next_sock.fetch_add(1, Ordering::SeqCst);
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let mut socks = self.socks.lock().await;
        let pair = Arc::new(SockPair {
            ctrl_tx,
            ctrl_rx: Mutex::new(ctrl_rx),
            data_tx,
            data_rx: Mutex::new(data_rx),
        });
        socks.insert(csock, pair.clone());
        socks.insert(dsock, pair);
        Ok((csock, dsock))
    }

    async fn send_msg(&self, csock: SockId, path: &str, cmd: CtrlCmd) -> Result<(), PppoeError> {
        let mut rec = self.recorded.lock().await;
        if let CtrlCmd::Listen { service, .. } = &cmd {
            *rec.listen_counts.entry(service.clone()).or_insert(0) += 1;
        }
        rec.sent_msgs.push((csock, path.to_string(), cmd));
        Ok(())
    }

    async fn recv_ctrl(&self, csock: SockId) -> Result<CtrlEvent, PppoeError> {
        let pair = {
            let socks = self.socks.lock().await;
            socks
                .get(&csock)
                .cloned()
                .ok_or_else(|| PppoeError::UnknownRoute {
                    hook: String::new(),
                    reason: format!("no such control socket {csock}"),
                })?
        };
        let mut rx = pair.ctrl_rx.lock().await;
        rx.recv().await.ok_or_else(|| PppoeError::GraphIo {
            path: String::new(),
            source: std::io::Error::other("control channel closed"),
        })
    }

    async fn recv_data(&self, dsock: SockId) -> Result<DataFrame, PppoeError> {
        let pair = {
            let socks = self.socks.lock().await;
            socks
                .get(&dsock)
                .cloned()
                .ok_or_else(|| PppoeError::UnknownRoute {
                    hook: String::new(),
                    reason: format!("no such data socket {dsock}"),
                })?
        };
        let mut rx = pair.data_rx.lock().await;
        rx.recv().await.ok_or_else(|| PppoeError::GraphIo {
            path: String::new(),
            source: std::io::Error::other("data channel closed"),
        })
    }

    async fn send_data(&self, dsock: SockId, hook: &str, bytes: &[u8]) -> Result<(), PppoeError> {
        let mut rec = self.recorded.lock().await;
        rec.sent_data.push((dsock, hook.to_string(), bytes.to_vec()));
        Ok(())
    }

    async fn disconnect(&self, csock: SockId, path: &str, hook: &str) -> Result<(), PppoeError> {
        self.recorded
            .lock()
            .await
            .disconnects
            .push((csock, path.to_string(), hook.to_string()));
        Ok(())
    }

    async fn shutdown_node(&self, csock: SockId, path: &str) -> Result<(), PppoeError> {
        self.recorded
            .lock()
            .await
            .shutdowns
            .push((csock, path.to_string()));
        Ok(())
    }

    async fn get_node_id(&self, _csock: SockId, _path: &str) -> Result<NodeId, PppoeError> {
        Ok(self.next_node.fetch_add(1, Ordering::SeqCst))
    }

    async fn mkpeer(
        &self,
        _csock: SockId,
        _path: &str,
        _hook: &str,
        _node_type: &str,
        _peer_hook: &str,
    ) -> Result<NodeId, PppoeError> {
        if self.fail_mkpeer.load(Ordering::SeqCst) {
            return Err(PppoeError::GraphIo {
                path: _path.to_string(),
                source: std::io::Error::other("mkpeer forced failure"),
            });
        }
        Ok(self.next_node.fetch_add(1, Ordering::SeqCst))
    }

    async fn connect_hook(
        &self,
        _csock: SockId,
        _path: &str,
        _hook: &str,
        _peer_path: &str,
        _peer_hook: &str,
    ) -> Result<(), PppoeError> {
        Ok(())
    }

    async fn probe_hook_peer(
        &self,
        _csock: SockId,
        _path: &str,
        _hook: &str,
        _node_type: &str,
    ) -> Result<Option<NodeId>, PppoeError> {
        Ok(*self.preexisting_node.lock().await)
    }

    async fn iface_set_up(&self, iface: &str) -> Result<(), PppoeError> {
        self.recorded.lock().await.ifaces_up.push(iface.to_string());
        Ok(())
    }

    async fn kldload_ether(&self) -> Result<(), PppoeError> {
        self.recorded.lock().await.kldload_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_then_recv_ctrl_round_trips() {
        let chan = FakeGraphChannel::new();
        let (csock, _dsock) = chan.mk_sock_node().await.unwrap();
        chan.push_ctrl_event(csock, CtrlEvent::Success {
            hook: "mpd100-1".to_string(),
        })
        .await;
        let got = chan.recv_ctrl(csock).await.unwrap();
        assert_eq!(got, CtrlEvent::Success {
            hook: "mpd100-1".to_string()
        });
    }

    #[tokio::test]
    async fn mkpeer_can_be_forced_to_fail() {
        let chan = FakeGraphChannel::new();
        let (csock, _) = chan.mk_sock_node().await.unwrap();
        chan.make_mkpeer_fail();
        let err = chan.mkpeer(csock, "em0:", "orphans", "pppoe", "ethernet").await;
        assert!(err.is_err());
    }
}
