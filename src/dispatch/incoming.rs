// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Accepts an incoming PADI/PADR and binds it to a waiting link (spec
//! §4.6). The PPPoE node's `OFFER` reply must originate from the node
//! itself, yet the frame that triggered acceptance has to be replayed into
//! that same node from the outside. A tee node bridged in for the
//! duration of the handshake lets the daemon inject the frame through a
//! socket node while the PPPoE node sees it arriving from Ethernet.

use std::collections::HashMap;

use crate::{
    cfg::enums::Direction,
    error::PppoeError,
    graph::{
        channel::{CtrlCmd, GraphChannel, NodeId},
        registry::{ParentHandle, ParentIfRegistry},
    },
    host::{LinkHost, LinkOpt},
    hook_name::format_hook,
    session::link::LinkSession,
    wire,
};

/// 14-byte Ethernet header plus the 6-byte PPPoE discovery header: nothing
/// shorter can possibly carry a Service-Name tag.
const MIN_FRAME_LEN: usize = 20;

/// The daemon's own socket-node path, used only to address the data
/// socket that replays the original frame into the temporary tee. A real
/// binding resolves this to the `NgMkSockNode` path backing `parent.dsock`;
/// `GraphChannel` implementations that are path-agnostic (including
/// [`crate::graph::fake::FakeGraphChannel`]) may ignore it entirely.
const SELF_SOCK_PATH: &str = ".:";

/// Formats the local hook name the tee's replay path is wired under,
/// distinct per link so concurrent incoming frames never collide.
fn local_replay_hook(link_id: u32) -> String {
    format!("in{link_id}")
}

/// Addresses a freshly created node by id, in the absence of a path
/// returned for it directly (`mkpeer` only reports the id).
fn node_ref_path(id: NodeId) -> String {
    format!("[{id:x}]:")
}

/// Three-level AC-Name fallback for `OFFER` (spec §4.6): configured name,
/// else the host's name, else `"NONAME"`.
fn resolve_ac_name(configured: &str, hostname: Option<&str>) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    if let Some(name) = hostname
        && !name.is_empty()
    {
        return name.to_string();
    }
    "NONAME".to_string()
}

/// A configured service of `""` or `"*"` accepts any requested service
/// name; otherwise the match must be exact.
fn service_matches(configured: &str, requested: &str) -> bool {
    configured.is_empty() || configured == "*" || configured == requested
}

/// Linear scan (spec §4.6 step 3) over `sessions`, sorted by link id for a
/// deterministic "first match wins": not busy, same parent, matching
/// service, `INCOMING` enabled.
async fn select_link<H: LinkHost>(
    sessions: &HashMap<u32, LinkSession<H>>,
    host: &H,
    parent_node_path: &str,
    service: &str,
) -> Option<u32> {
    let mut ids: Vec<u32> = sessions.keys().copied().collect();
    ids.sort_unstable();

    for id in ids {
        let session = &sessions[&id];
        if session.parent_path != parent_node_path {
            continue;
        }
        if host.phys_is_busy(session.host_link).await {
            continue;
        }
        if !host.enabled(session.host_link, LinkOpt::Incoming).await {
            continue;
        }
        if !service_matches(&session.service, service) {
            continue;
        }
        return Some(id);
    }
    None
}

/// Bundles the tee's full setup (spec §4.6 step 6) with a single unwind
/// path: mkpeer, wire the daemon's replay hook, `OFFER`, `SERVICE`, replay
/// the original frame, then disconnect the replay wiring. Returns the
/// tee's path, kept on the session until `open_incoming` tears it down.
async fn wire_tee<C: GraphChannel>(
    channel: &C,
    parent: &ParentHandle,
    session_hook: &str,
    link_id: u32,
    ac_name: &str,
    service: &str,
    frame: &[u8],
) -> Result<String, PppoeError> {
    let tee_id = channel
        .mkpeer(parent.csock, &parent.node_path, session_hook, "tee", "left")
        .await?;
    let tee_path = node_ref_path(tee_id);
    let replay_hook = local_replay_hook(link_id);

    let wired = async {
        channel
            .connect_hook(parent.csock, SELF_SOCK_PATH, &replay_hook, &tee_path, "left2right")
            .await?;
        channel
            .send_msg(parent.csock, &parent.node_path, CtrlCmd::Offer {
                hook: session_hook.to_string(),
                ac_name: ac_name.to_string(),
            })
            .await?;
        channel
            .send_msg(parent.csock, &parent.node_path, CtrlCmd::Service {
                hook: session_hook.to_string(),
                service: service.to_string(),
            })
            .await?;
        channel.send_data(parent.dsock, &replay_hook, frame).await
    }
    .await;

    channel
        .disconnect(parent.csock, SELF_SOCK_PATH, &replay_hook)
        .await
        .ok();

    if let Err(e) = wired {
        channel.shutdown_node(parent.csock, &tee_path).await.ok();
        return Err(e);
    }

    Ok(tee_path)
}

/// Materializes a runnable instance from a template link and clones its
/// static configuration, per spec §9's template-link design note.
async fn instantiate_template<H: LinkHost>(
    host: &H,
    template: &LinkSession<H>,
    new_link_id: u32,
) -> LinkSession<H> {
    let new_host_link = host.link_inst(template.host_link).await;
    let mut instance = LinkSession::new(new_link_id, new_host_link, Direction::Incoming);
    instance.iface = template.iface.clone();
    instance.parent_path = template.parent_path.clone();
    instance.parent_hook = template.parent_hook.clone();
    instance.service = template.service.clone();
    instance.ac_name = template.ac_name.clone();
    instance.max_payload = template.max_payload;
    instance.mac_format = template.mac_format;
    instance
}

/// Handles one incoming discovery frame (spec §4.6). `frame` is the full
/// Ethernet frame (14-byte header included) as received on `parent`'s data
/// socket. `next_link_id` hands out fresh local link ids for template
/// instantiation. All failures are handled internally — malformed input,
/// overload, no match, and graph errors are all logged and dropped rather
/// than propagated, since there is no caller left to hand an error to by
/// the time a frame reaches this point.
#[allow(clippy::too_many_arguments)]
pub async fn handle_frame<H: LinkHost, C: GraphChannel>(
    sessions: &mut HashMap<u32, LinkSession<H>>,
    host: &H,
    channel: &C,
    registry: &ParentIfRegistry,
    parent: &ParentHandle,
    pid: u32,
    next_link_id: &mut u32,
    hostname: Option<&str>,
    frame: &[u8],
) {
    if frame.len() < MIN_FRAME_LEN {
        tracing::warn!(len = frame.len(), "incoming frame too short, dropping");
        return;
    }

    let mut peer_mac = [0u8; 6];
    peer_mac.copy_from_slice(&frame[6..12]);

    let (_, tags) = match wire::decode_discovery(&frame[14..]) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "malformed incoming discovery frame, dropping");
            return;
        },
    };

    if host.overloaded().await {
        tracing::debug!("host overloaded, dropping incoming frame");
        return;
    }

    let requested_service = tags.service_name.clone().unwrap_or_default();

    let Some(chosen_id) = select_link(sessions, host, &parent.node_path, &requested_service).await
    else {
        tracing::debug!(service = %requested_service, "no accepting link for incoming frame");
        return;
    };

    let is_template = host.is_template(sessions[&chosen_id].host_link).await;

    let (link_id, instantiated_host_link) = if is_template {
        *next_link_id += 1;
        let new_id = *next_link_id;
        let instance = instantiate_template(host, &sessions[&chosen_id], new_id).await;
        let new_host_link = instance.host_link;
        sessions.insert(new_id, instance);
        (new_id, Some(new_host_link))
    } else {
        (chosen_id, None)
    };

    let teardown_instance = |sessions: &mut HashMap<u32, LinkSession<H>>| {
        if let Some(host_link) = instantiated_host_link {
            sessions.remove(&link_id);
            return Some(host_link);
        }
        None
    };

    let session_parent = match registry
        .acquire(channel, &parent.node_path, &parent.node_path, "orphans")
        .await
    {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "failed to acquire parent for incoming link");
            if let Some(host_link) = teardown_instance(sessions)
                && !host.is_static(host_link).await
            {
                host.link_shutdown(host_link).await;
            }
            return;
        },
    };

    let session_hook = format_hook(pid, link_id);
    let ac_name = resolve_ac_name(&sessions[&link_id].ac_name, hostname);

    let wired = wire_tee(
        channel,
        &session_parent,
        &session_hook,
        link_id,
        &ac_name,
        &requested_service,
        frame,
    )
    .await;

    match wired {
        Ok(tee_path) => {
            let session = sessions.get_mut(&link_id).expect("just inserted or selected");
            session.enter_connecting_incoming(
                session_parent,
                session_hook,
                tee_path,
                peer_mac,
                requested_service,
                tags.agent_circuit_id.unwrap_or_default(),
                tags.agent_remote_id.unwrap_or_default(),
            );
            host.phys_incoming(session.host_link).await;
        },
        Err(e) => {
            tracing::warn!(error = %e, link_id, "failed to wire incoming tee, dropping");
            registry.release(channel, &session_parent).await.ok();
            if let Some(host_link) = teardown_instance(sessions)
                && !host.is_static(host_link).await
            {
                host.link_shutdown(host_link).await;
            }
        },
    }
}
