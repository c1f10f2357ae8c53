// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-link PPPoE session state machine (spec §4.4).

use tokio::time::{Duration, Instant};

use crate::{
    cfg::{config::PPPOE_CONNECT_TIMEOUT_SECS, enums::{Direction, MacFormat, format_mac}},
    error::PppoeError,
    graph::{
        channel::{CtrlCmd, CtrlEvent, GraphChannel},
        registry::{ParentHandle, ParentIfRegistry},
    },
    host::{LinkHost, LinkOpt, PhysDownReason},
    hook_name::format_hook,
    session::types::{State, ZERO_MAC},
};

/// A single PPPoE link's session state, identity fields, and connect
/// timer (spec §3).
pub struct LinkSession<H: LinkHost> {
    pub link_id: u32,
    pub host_link: H::LinkId,

    pub iface: String,
    pub parent_path: String,
    pub parent_hook: String,
    pub service: String,
    pub ac_name: String,
    pub max_payload: u16,
    pub mac_format: MacFormat,

    pub peer_mac: [u8; 6],
    pub real_service: String,
    pub agent_cid: String,
    pub agent_rid: String,
    /// Last `SESSIONID` seen, kept for diagnostics only (spec §9 open
    /// question: the original silently drops these).
    pub session_id: Option<u16>,

    pub state: State,
    pub direction: Direction,
    pub opened: bool,
    pub mp_reply: bool,

    connect_deadline: Option<Instant>,

    pub parent: Option<ParentHandle>,
    pub listener_subscribed: bool,
    pub session_hook: Option<String>,
    /// Path of the temporary tee node wired in by `IncomingDispatcher`
    /// while this session waited to be accepted (spec §4.6). Cleared once
    /// `open_incoming` shuts it down, or when the session goes DOWN.
    pub tee_node_path: Option<String>,
}

impl<H: LinkHost> LinkSession<H> {
    pub fn new(link_id: u32, host_link: H::LinkId, direction: Direction) -> Self {
        Self {
            link_id,
            host_link,
            iface: String::new(),
            parent_path: String::new(),
            parent_hook: "orphans".to_string(),
            service: String::new(),
            ac_name: String::new(),
            max_payload: 0,
            mac_format: MacFormat::default(),
            peer_mac: ZERO_MAC,
            real_service: String::new(),
            agent_cid: String::new(),
            agent_rid: String::new(),
            session_id: None,
            state: State::Down,
            direction,
            opened: false,
            mp_reply: false,
            connect_deadline: None,
            parent: None,
            listener_subscribed: false,
            session_hook: None,
            tee_node_path: None,
        }
    }

    /// Invariant check (spec §8, invariant 1): holds for any session in
    /// `State::Down`.
    pub fn down_invariants_hold(&self) -> bool {
        self.state != State::Down
            || (self.connect_deadline.is_none()
                && self.peer_mac == ZERO_MAC
                && self.real_service.is_empty()
                && self.agent_cid.is_empty()
                && self.agent_rid.is_empty()
                && !self.mp_reply)
    }

    pub fn connect_deadline(&self) -> Option<Instant> {
        self.connect_deadline
    }

    /// Renders `peer_mac` per the configured [`MacFormat`], for
    /// calling/called-number reporting.
    pub fn render_peer_mac(&self) -> String {
        format_mac(&self.peer_mac, self.mac_format)
    }

    /// `open()` for an outgoing (originating) link (spec §4.4).
    pub async fn open_outgoing<C: GraphChannel>(
        &mut self,
        host: &H,
        channel: &C,
        registry: &ParentIfRegistry,
        pid: u32,
    ) -> Result<(), PppoeError> {
        if self.state != State::Down {
            return Ok(());
        }

        host.disable_deny(self.host_link, LinkOpt::Acfcomp).await;

        let parent = registry
            .acquire(channel, &self.iface, &self.parent_path, &self.parent_hook)
            .await?;

        let hook = format_hook(pid, self.link_id);
        let upper = host.phys_get_upper_hook(self.host_link).await;

        if let Err(e) = channel
            .connect_hook(parent.csock, &parent.node_path, &hook, &upper.path, &upper.hook)
            .await
        {
            registry.release(channel, &parent).await.ok();
            host.phys_down(self.host_link, PhysDownReason::Error, &e.to_string())
                .await;
            return Err(e);
        }

        let connect = channel
            .send_msg(parent.csock, &parent.node_path, CtrlCmd::Connect {
                hook: hook.clone(),
                service: self.service.clone(),
            })
            .await;

        if let Err(e) = connect {
            channel
                .disconnect(parent.csock, &parent.node_path, &hook)
                .await
                .ok();
            registry.release(channel, &parent).await.ok();
            host.phys_down(self.host_link, PhysDownReason::Error, &e.to_string())
                .await;
            return Err(e);
        }

        if self.max_payload != 0 {
            channel
                .send_msg(parent.csock, &parent.node_path, CtrlCmd::SetMaxPayload {
                    hook: hook.clone(),
                    value: self.max_payload,
                })
                .await?;
        }

        self.connect_deadline =
            Some(Instant::now() + Duration::from_secs(PPPOE_CONNECT_TIMEOUT_SECS));
        self.state = State::Connecting;
        self.real_service = self.service.clone();
        self.session_hook = Some(hook);
        self.parent = Some(parent);
        self.opened = true;
        Ok(())
    }

    /// Starts listening for incoming PADI/PADR on this link's configured
    /// service (spec §4.3): acquires the parent attachment and subscribes
    /// the service on it, creating the shared `listen-<service>` hook on
    /// first subscription. Idempotent — a link already subscribed is a
    /// no-op. Call this once a template link's `iface`/`service` are set,
    /// before any frame can reach [`crate::dispatch::incoming::handle_frame`].
    pub async fn start_listening<C: GraphChannel>(
        &mut self,
        channel: &C,
        registry: &ParentIfRegistry,
    ) -> Result<(), PppoeError> {
        if self.listener_subscribed {
            return Ok(());
        }

        let parent = registry
            .acquire(channel, &self.iface, &self.parent_path, &self.parent_hook)
            .await?;

        if let Err(e) = parent
            .listeners
            .subscribe(channel, parent.csock, &parent.node_path, &self.service)
            .await
        {
            registry.release(channel, &parent).await.ok();
            return Err(e);
        }

        self.parent = Some(parent);
        self.listener_subscribed = true;
        Ok(())
    }

    /// `close()` (spec §4.4): tears down an active session and notifies
    /// the host, if not already DOWN.
    pub async fn close<C: GraphChannel>(
        &mut self,
        host: &H,
        channel: &C,
        registry: &ParentIfRegistry,
        reason: PhysDownReason,
    ) -> Result<(), PppoeError> {
        self.opened = false;
        if self.state == State::Down {
            return Ok(());
        }

        if let (Some(parent), Some(hook)) = (&self.parent, &self.session_hook) {
            channel
                .disconnect(parent.csock, &parent.node_path, hook)
                .await
                .ok();
        }

        self.connect_deadline = None;
        self.peer_mac = ZERO_MAC;
        self.real_service.clear();
        self.agent_cid.clear();
        self.agent_rid.clear();
        self.mp_reply = false;
        self.session_hook = None;
        self.tee_node_path = None;
        self.state = State::Down;

        let detail = format!("{reason:?}");
        host.phys_down(self.host_link, reason, &detail).await;

        if let Some(parent) = self.parent.take() {
            registry.release(channel, &parent).await.ok();
        }

        Ok(())
    }

    /// `shutdown()` (spec §4.4): `close()` plus unsubscribing the
    /// listener (incoming-role links only).
    pub async fn shutdown<C: GraphChannel>(
        &mut self,
        host: &H,
        channel: &C,
        registry: &ParentIfRegistry,
    ) -> Result<(), PppoeError> {
        self.close(host, channel, registry, PhysDownReason::Manually)
            .await?;

        if self.listener_subscribed
            && let Some(parent) = self.parent.as_ref()
        {
            parent
                .listeners
                .unsubscribe(channel, parent.csock, &parent.node_path, &self.service)
                .await
                .ok();
            self.listener_subscribed = false;
        }
        Ok(())
    }

    /// Reacts to an asynchronous control message already resolved to this
    /// session (spec §4.4's reaction table). FAIL/CLOSE perform the same
    /// teardown as [`Self::close`] — disconnecting the session hook and
    /// releasing the parent — rather than a partial state flip, so a
    /// session that never reconnects does not leak its `ParentIf` refcount.
    pub async fn on_ctrl_event<C: GraphChannel>(
        &mut self,
        host: &H,
        channel: &C,
        registry: &ParentIfRegistry,
        event: &CtrlEvent,
    ) {
        match event {
            CtrlEvent::Success { .. } => self.on_success(host).await,
            CtrlEvent::Fail { .. } => {
                if matches!(self.state, State::Connecting | State::Ready) {
                    self.close(host, channel, registry, PhysDownReason::ConFailed)
                        .await
                        .ok();
                }
            },
            CtrlEvent::Close { .. } => {
                if self.state != State::Down {
                    self.close(host, channel, registry, PhysDownReason::Dropped)
                        .await
                        .ok();
                }
            },
            CtrlEvent::SetMaxPayloadReply { value, .. } => {
                if self.state != State::Down {
                    self.mp_reply = self.max_payload != 0 && *value == self.max_payload;
                }
            },
            CtrlEvent::SessionId { session_id, .. } => {
                self.session_id = Some(*session_id);
            },
            CtrlEvent::AcName { value, .. } => {
                tracing::debug!(link_id = self.link_id, ac_name = %value, "peer AC-Name");
            },
            CtrlEvent::Hurl { value, .. } => {
                tracing::debug!(link_id = self.link_id, hurl = %value, "peer HURL");
            },
            CtrlEvent::Motm { value, .. } => {
                tracing::debug!(link_id = self.link_id, motm = %value, "peer MOTM");
            },
            CtrlEvent::Unknown => {},
        }
    }

    async fn on_success(&mut self, host: &H) {
        match self.state {
            State::Connecting if self.opened => {
                self.connect_deadline = None;
                self.state = State::Up;
                host.phys_up(self.host_link).await;
            },
            State::Connecting => {
                self.connect_deadline = None;
                self.state = State::Ready;
            },
            // Spec §8 invariant 4: a duplicate SUCCESS is a no-op.
            State::Ready | State::Up | State::Down => {},
        }
    }

    /// Records an incoming session accepted by `IncomingDispatcher` (spec
    /// §4.6 step 6): the graph wiring already succeeded, so this only
    /// updates tracked state and starts the connect timer.
    #[allow(clippy::too_many_arguments)]
    pub fn enter_connecting_incoming(
        &mut self,
        parent: ParentHandle,
        session_hook: String,
        tee_node_path: String,
        peer_mac: [u8; 6],
        real_service: String,
        agent_cid: String,
        agent_rid: String,
    ) {
        self.direction = Direction::Incoming;
        self.opened = false;
        self.state = State::Connecting;
        self.parent = Some(parent);
        self.session_hook = Some(session_hook);
        self.tee_node_path = Some(tee_node_path);
        self.peer_mac = peer_mac;
        self.real_service = real_service;
        self.agent_cid = agent_cid;
        self.agent_rid = agent_rid;
        self.connect_deadline =
            Some(Instant::now() + Duration::from_secs(PPPOE_CONNECT_TIMEOUT_SECS));
    }

    /// Opens a `Ready` incoming link after the user calls `open()`
    /// post-acceptance (spec §4.4, incoming case): the temporary tee node
    /// is shut down, directly exposing the session hook on the PPPoE
    /// node, and if the session already reached `Ready` the link
    /// transitions to `Up`.
    pub async fn open_incoming<C: GraphChannel>(&mut self, host: &H, channel: &C) {
        if self.state != State::Ready {
            return;
        }
        if let (Some(parent), Some(tee)) = (&self.parent, self.tee_node_path.take()) {
            channel.shutdown_node(parent.csock, &tee).await.ok();
        }
        self.state = State::Up;
        self.opened = true;
        host.phys_up(self.host_link).await;
    }

    /// Timer fire (spec §4.4): logs are the caller's responsibility via
    /// `tracing`; this only performs the state transition and host
    /// notification.
    pub async fn on_timer_fire<C: GraphChannel>(
        &mut self,
        host: &H,
        channel: &C,
        registry: &ParentIfRegistry,
    ) {
        self.close(host, channel, registry, PhysDownReason::ConFailed)
            .await
            .ok();
    }

    /// MTU/MRU reporting (spec §4.4).
    pub fn reported_mtu(&self, default_mtu: u16) -> u16 {
        if self.max_payload != 0 && self.mp_reply {
            self.max_payload
        } else {
            default_mtu
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::config::{PPPOE_DEFAULT_MTU, derive_parent_path},
        graph::fake::FakeGraphChannel,
        host::test_support::RecordingHost,
    };

    fn session() -> LinkSession<RecordingHost> {
        let mut s = LinkSession::new(1, 42, Direction::Outgoing);
        s.iface = "em0".to_string();
        s.parent_path = derive_parent_path("em0");
        s.service = "isp".to_string();
        s
    }

    #[tokio::test]
    async fn open_close_restores_down_state() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        assert_eq!(s.state, State::Connecting);

        s.close(&host, &chan, &registry, PhysDownReason::Manually)
            .await
            .unwrap();
        assert_eq!(s.state, State::Down);
        assert!(s.down_invariants_hold());
        assert!(!s.opened);
    }

    #[tokio::test]
    async fn success_while_opened_reaches_up_and_calls_phys_up_once() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::Success {
            hook: "mpd100-1".to_string(),
        })
        .await;
        assert_eq!(s.state, State::Up);
        assert_eq!(host.phys_up_calls(), 1);

        // Duplicate SUCCESS is a no-op (spec invariant 4).
        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::Success {
            hook: "mpd100-1".to_string(),
        })
        .await;
        assert_eq!(host.phys_up_calls(), 1);
    }

    #[tokio::test]
    async fn timeout_reports_con_failed_and_clears_timer() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        s.on_timer_fire(&host, &chan, &registry).await;

        assert_eq!(s.state, State::Down);
        assert!(s.connect_deadline().is_none());
        assert_eq!(host.phys_down_reasons(), vec![PhysDownReason::ConFailed]);
    }

    #[tokio::test]
    async fn max_payload_echo_mismatch_leaves_mp_reply_false() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();
        s.max_payload = 1500;

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::SetMaxPayloadReply {
            hook: "mpd100-1".to_string(),
            value: 1492,
        })
        .await;

        assert!(!s.mp_reply);
        assert_eq!(s.reported_mtu(PPPOE_DEFAULT_MTU), PPPOE_DEFAULT_MTU);
    }

    #[tokio::test]
    async fn session_id_is_recorded_without_changing_state() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::SessionId {
            hook: "mpd100-1".to_string(),
            session_id: 42,
        })
        .await;

        assert_eq!(s.session_id, Some(42));
        assert_eq!(s.state, State::Connecting);
    }

    #[tokio::test]
    async fn open_incoming_shuts_down_tee_and_reaches_up() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();
        let parent = registry.acquire(&chan, "em0", "em0:", "orphans").await.unwrap();

        s.enter_connecting_incoming(
            parent,
            "mpd100-1".to_string(),
            "[7]:".to_string(),
            [1, 2, 3, 4, 5, 6],
            "isp".to_string(),
            "cid".to_string(),
            "rid".to_string(),
        );
        assert_eq!(s.state, State::Connecting);

        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::Success {
            hook: "mpd100-1".to_string(),
        })
        .await;
        assert_eq!(s.state, State::Ready);

        s.open_incoming(&host, &chan).await;
        assert_eq!(s.state, State::Up);
        assert!(s.opened);
        assert_eq!(host.phys_up_calls(), 1);
        assert!(s.tee_node_path.is_none());
    }

    #[tokio::test]
    async fn mac_format_affects_only_rendering() {
        let mut s = session();
        s.peer_mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        s.mac_format = MacFormat::UnixLike;
        assert_eq!(s.render_peer_mac(), "00:11:22:33:44:55");
        assert_eq!(s.peer_mac, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[tokio::test]
    async fn fail_while_connecting_tears_down_and_releases_parent() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        assert_eq!(registry.len(), 1);

        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::Fail {
            hook: "mpd100-1".to_string(),
        })
        .await;

        assert_eq!(s.state, State::Down);
        assert!(s.down_invariants_hold());
        assert!(s.parent.is_none());
        assert_eq!(registry.len(), 0);
        assert_eq!(host.phys_down_reasons(), vec![PhysDownReason::ConFailed]);
    }

    #[tokio::test]
    async fn close_while_up_tears_down_and_releases_parent() {
        let host = RecordingHost::new();
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut s = session();

        s.open_outgoing(&host, &chan, &registry, 100).await.unwrap();
        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::Success {
            hook: "mpd100-1".to_string(),
        })
        .await;
        assert_eq!(s.state, State::Up);

        s.on_ctrl_event(&host, &chan, &registry, &CtrlEvent::Close {
            hook: "mpd100-1".to_string(),
        })
        .await;

        assert_eq!(s.state, State::Down);
        assert!(s.down_invariants_hold());
        assert!(s.parent.is_none());
        assert_eq!(registry.len(), 0);
        assert_eq!(host.phys_down_reasons(), vec![PhysDownReason::Dropped]);
    }

    #[tokio::test]
    async fn start_listening_subscribes_once_and_flags_session() {
        let chan = FakeGraphChannel::new();
        let registry = ParentIfRegistry::new(4);
        let mut a = session();
        let mut b = session();
        b.iface = "em0".to_string();
        b.parent_path = derive_parent_path("em0");
        b.service = "isp".to_string();

        a.start_listening(&chan, &registry).await.unwrap();
        assert!(a.listener_subscribed);
        assert_eq!(chan.listen_count("isp"), 1);

        // A second incoming-role link on the same interface and service
        // shares the listener entry rather than re-sending LISTEN.
        b.start_listening(&chan, &registry).await.unwrap();
        assert_eq!(chan.listen_count("isp"), 1);
        assert_eq!(
            a.parent.as_ref().unwrap().listeners.ref_count("isp").await,
            2
        );

        // Idempotent: calling it again on an already-subscribed link is a
        // no-op.
        a.start_listening(&chan, &registry).await.unwrap();
        assert_eq!(
            a.parent.as_ref().unwrap().listeners.ref_count("isp").await,
            2
        );
    }
}
