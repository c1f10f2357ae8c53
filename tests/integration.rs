// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! End-to-end scenarios driving [`pppoe_link_rs::session::LinkSession`],
//! [`pppoe_link_rs::dispatch`], and [`pppoe_link_rs::graph::registry`]
//! together through the in-memory [`pppoe_link_rs::graph::fake::FakeGraphChannel`]
//! and [`pppoe_link_rs::host::test_support::RecordingHost`], the way a host
//! daemon's event loop would.

use std::collections::HashMap;

use pppoe_link_rs::{
    cfg::{config::derive_parent_path, enums::Direction},
    dispatch::{ctrl_demux, incoming},
    graph::{channel::CtrlEvent, fake::FakeGraphChannel, registry::ParentIfRegistry},
    host::{PhysDownReason, test_support::RecordingHost},
    session::{LinkSession, State},
};

const PID: u32 = 4242;

fn outgoing_link(link_id: u32, host_link: u32, service: &str) -> LinkSession<RecordingHost> {
    let mut s = LinkSession::new(link_id, host_link, Direction::Outgoing);
    s.iface = "em0".to_string();
    s.parent_path = derive_parent_path("em0");
    s.service = service.to_string();
    s
}

/// Scenario 1: a successful outgoing dial reaches UP and calls `phys_up`
/// exactly once, even if the AC echoes a duplicate SUCCESS afterwards.
#[tokio::test]
async fn outgoing_dial_reaches_up_once() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(4);
    let mut sessions = HashMap::new();
    let mut link = outgoing_link(1, 10, "isp");
    link.open_outgoing(&host, &chan, &registry, PID).await.unwrap();
    let csock = link.parent.as_ref().unwrap().csock;
    sessions.insert(1, link);

    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, csock, CtrlEvent::Success {
        hook: "mpd4242-1".to_string(),
    })
    .await;
    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, csock, CtrlEvent::Success {
        hook: "mpd4242-1".to_string(),
    })
    .await;

    assert_eq!(sessions[&1].state, State::Up);
    assert_eq!(host.phys_up_calls(), 1);
}

/// Scenario 2: the AC rejects the dial with FAIL; the link reports
/// `ConFailed` and returns to DOWN, ready to be opened again later.
#[tokio::test]
async fn outgoing_dial_rejected_reports_con_failed() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(4);
    let mut sessions = HashMap::new();
    let mut link = outgoing_link(1, 10, "isp");
    link.open_outgoing(&host, &chan, &registry, PID).await.unwrap();
    let csock = link.parent.as_ref().unwrap().csock;
    sessions.insert(1, link);

    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, csock, CtrlEvent::Fail {
        hook: "mpd4242-1".to_string(),
    })
    .await;

    assert_eq!(sessions[&1].state, State::Down);
    assert!(sessions[&1].down_invariants_hold());
    assert!(sessions[&1].parent.is_none());
    assert_eq!(registry.len(), 0);
    assert_eq!(host.phys_down_reasons(), vec![PhysDownReason::ConFailed]);
}

/// Scenario 3: an UP session drops when the peer sends CLOSE.
#[tokio::test]
async fn peer_close_on_up_session_reports_dropped() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(4);
    let mut sessions = HashMap::new();
    let mut link = outgoing_link(1, 10, "isp");
    link.open_outgoing(&host, &chan, &registry, PID).await.unwrap();
    let csock = link.parent.as_ref().unwrap().csock;
    sessions.insert(1, link);
    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, csock, CtrlEvent::Success {
        hook: "mpd4242-1".to_string(),
    })
    .await;
    assert_eq!(sessions[&1].state, State::Up);

    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, csock, CtrlEvent::Close {
        hook: "mpd4242-1".to_string(),
    })
    .await;

    assert_eq!(sessions[&1].state, State::Down);
    assert_eq!(host.phys_down_reasons(), vec![PhysDownReason::Dropped]);
}

/// Scenario 4: two links dialing out on the same interface share one
/// `ParentIf` entry, and it is freed once both close.
#[tokio::test]
async fn two_links_share_one_parent_and_free_it_together() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(4);

    let mut a = outgoing_link(1, 10, "isp-a");
    let mut b = outgoing_link(2, 11, "isp-b");
    a.open_outgoing(&host, &chan, &registry, PID).await.unwrap();
    b.open_outgoing(&host, &chan, &registry, PID).await.unwrap();
    assert_eq!(registry.len(), 1);

    a.close(&host, &chan, &registry, PhysDownReason::Manually)
        .await
        .unwrap();
    assert_eq!(registry.len(), 1);
    b.close(&host, &chan, &registry, PhysDownReason::Manually)
        .await
        .unwrap();
    assert_eq!(registry.len(), 0);
}

/// Scenario 5: a registry at capacity refuses a third link's parent
/// attachment, and the caller's own link stays DOWN.
#[tokio::test]
async fn parent_registry_capacity_is_enforced_across_links() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(1);

    let mut a = outgoing_link(1, 10, "isp");
    a.open_outgoing(&host, &chan, &registry, PID).await.unwrap();

    let mut b = outgoing_link(2, 11, "isp");
    b.iface = "em1".to_string();
    b.parent_path = derive_parent_path("em1");
    let err = b.open_outgoing(&host, &chan, &registry, PID).await;

    assert!(err.is_err());
    assert_eq!(b.state, State::Down);
}

/// Scenario 6: an incoming PADI on a template link instantiates a fresh
/// session, reaches READY on SUCCESS, and `open()` tears down the tee node
/// to expose the session hook directly before reaching UP.
#[tokio::test]
async fn incoming_session_reaches_up_through_ready_and_open() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(4);
    let mut sessions = HashMap::new();

    let parent = registry.acquire(&chan, "em0:", "em0:", "orphans").await.unwrap();
    let mut template = LinkSession::new(1u32, 10u32, Direction::Incoming);
    template.iface = "em0".to_string();
    template.parent_path = parent.node_path.clone();
    template.service = "isp".to_string();
    host.set_template(10, true);
    host.set_incoming_enabled(10, true);
    template.start_listening(&chan, &registry).await.unwrap();
    assert!(template.listener_subscribed);
    sessions.insert(1, template);

    let mut area = Vec::new();
    area.extend_from_slice(&pppoe_link_rs::wire::tag::TagType::ServiceName.to_u16().to_be_bytes());
    area.extend_from_slice(&3u16.to_be_bytes());
    area.extend_from_slice(b"isp");
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&0x8863u16.to_be_bytes());
    frame.push(0x11);
    frame.push(0x09);
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&(area.len() as u16).to_be_bytes());
    frame.extend_from_slice(&area);

    let mut next_id = 1u32;
    incoming::handle_frame(
        &mut sessions,
        &host,
        &chan,
        &registry,
        &parent,
        PID,
        &mut next_id,
        Some("router1"),
        &frame,
    )
    .await;

    assert_eq!(sessions.len(), 2);
    let instance_csock = sessions[&2].parent.as_ref().unwrap().csock;
    assert_eq!(sessions[&2].state, State::Connecting);

    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, instance_csock, CtrlEvent::Success {
        hook: "mpd4242-2".to_string(),
    })
    .await;
    assert_eq!(sessions[&2].state, State::Ready);

    let instance = sessions.get_mut(&2).unwrap();
    instance.open_incoming(&host, &chan).await;

    assert_eq!(instance.state, State::Up);
    assert!(instance.tee_node_path.is_none());
    assert_eq!(host.phys_up_calls(), 1);
    assert_eq!(host.phys_incoming_calls(), 1);
}

/// A control message for a link id this process never assigned is
/// dropped, never panics.
#[tokio::test]
async fn stray_control_message_for_unknown_link_is_dropped() {
    let host = RecordingHost::new();
    let chan = FakeGraphChannel::new();
    let registry = ParentIfRegistry::new(4);
    let mut sessions: HashMap<u32, LinkSession<RecordingHost>> = HashMap::new();

    ctrl_demux::route(&mut sessions, &host, &chan, &registry, PID, 1, CtrlEvent::Success {
        hook: "mpd4242-99".to_string(),
    })
    .await;
}
