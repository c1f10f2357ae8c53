// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The contract with the forwarding-graph control library (spec §6,
//! "Dependency contract with the graph control layer"). A production
//! implementation binds this to the real netgraph socket API; that binding
//! is an external collaborator and out of scope here (spec §1).

use crate::error::PppoeError;

/// Opaque socket identifier returned by [`GraphChannel::mk_sock_node`].
pub type SockId = u32;
/// Opaque graph node identifier, as returned by `NgGetNodeID`.
pub type NodeId = u64;

/// A control command sent to a PPPoE node via `NgSendMsg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtrlCmd {
    /// `NGM_PPPOE_CONNECT`: bind `hook` to `service` and start the
    /// discovery handshake as the initiator.
    Connect { hook: String, service: String },
    /// `NGM_PPPOE_SETMAXP`: request RFC 4638 max-payload negotiation.
    SetMaxPayload { hook: String, value: u16 },
    /// `NGM_PPPOE_LISTEN`: listen for `service` on `hook`.
    Listen { hook: String, service: String },
    /// `NGM_PPPOE_OFFER`: arm the node to answer a PADI with a PADO
    /// advertising `ac_name`.
    Offer { hook: String, ac_name: String },
    /// `NGM_PPPOE_SERVICE`: advertise acceptance of `service` on `hook`.
    Service { hook: String, service: String },
}

/// An asynchronous control message observed on a parent's control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtrlEvent {
    Success { hook: String },
    Fail { hook: String },
    Close { hook: String },
    SetMaxPayloadReply { hook: String, value: u16 },
    SessionId { hook: String, session_id: u16 },
    AcName { hook: String, value: String },
    Hurl { hook: String, value: String },
    Motm { hook: String, value: String },
    /// A message whose type cookie did not match the PPPoE cookie, or
    /// whose command this subsystem does not act on.
    Unknown,
}

/// A data frame delivered on a named hook (the PPPoE session data path or
/// a `listen-<service>` hook).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub hook: String,
    pub bytes: Vec<u8>,
}

/// Abstract handle to "the packet-forwarding graph control library"
/// (spec §6). Implementations may use `async fn` directly since this
/// trait is consumed via a generic type parameter, never as `dyn`.
pub trait GraphChannel: Send + Sync + 'static {
    /// `NgMkSockNode`: allocates a fresh (control, data) socket pair.
    async fn mk_sock_node(&self) -> Result<(SockId, SockId), PppoeError>;

    /// `NgSendMsg`.
    async fn send_msg(&self, csock: SockId, path: &str, cmd: CtrlCmd) -> Result<(), PppoeError>;

    /// `NgRecvMsg`: blocks (cooperatively) until the next control message
    /// for `csock` is available.
    async fn recv_ctrl(&self, csock: SockId) -> Result<CtrlEvent, PppoeError>;

    /// `NgRecvData`: blocks (cooperatively) until the next data frame for
    /// `dsock` is available.
    async fn recv_data(&self, dsock: SockId) -> Result<DataFrame, PppoeError>;

    /// `NgSendData`.
    async fn send_data(&self, dsock: SockId, hook: &str, bytes: &[u8]) -> Result<(), PppoeError>;

    /// `NgFuncDisconnect`.
    async fn disconnect(&self, csock: SockId, path: &str, hook: &str) -> Result<(), PppoeError>;

    /// `NgFuncShutdownNode`.
    async fn shutdown_node(&self, csock: SockId, path: &str) -> Result<(), PppoeError>;

    /// `NgGetNodeID`.
    async fn get_node_id(&self, csock: SockId, path: &str) -> Result<NodeId, PppoeError>;

    /// `MKPEER`: creates a new node of `node_type` off `path<hook>`,
    /// peered under `peer_hook`, returning its id.
    async fn mkpeer(
        &self,
        csock: SockId,
        path: &str,
        hook: &str,
        node_type: &str,
        peer_hook: &str,
    ) -> Result<NodeId, PppoeError>;

    /// `NGM_CONNECT`: wires `hook` on `path` to `peer_hook` on `peer_path`.
    async fn connect_hook(
        &self,
        csock: SockId,
        path: &str,
        hook: &str,
        peer_path: &str,
        peer_hook: &str,
    ) -> Result<(), PppoeError>;

    /// Queries whether `hook` on `path` is already attached to a node of
    /// `node_type`, returning its id if so (used to adopt an existing
    /// PPPoE node rather than creating a duplicate).
    async fn probe_hook_peer(
        &self,
        csock: SockId,
        path: &str,
        hook: &str,
        node_type: &str,
    ) -> Result<Option<NodeId>, PppoeError>;

    /// `IfaceSetFlag(iface, IFF_UP)`.
    async fn iface_set_up(&self, iface: &str) -> Result<(), PppoeError>;

    /// `kldload("ng_ether")`. Implementations should make repeated calls
    /// cheap (no-op if already loaded); the registry itself only calls
    /// this at most once per process.
    async fn kldload_ether(&self) -> Result<(), PppoeError>;
}
