// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Correlates asynchronous PPPoE control messages back to the
//! [`LinkSession`] whose session hook name they carry (spec §4.5).

use std::collections::HashMap;

use crate::{
    graph::{
        channel::{CtrlEvent, GraphChannel, SockId},
        registry::ParentIfRegistry,
    },
    host::LinkHost,
    hook_name::{parse_hook, parse_listen_hook},
    session::{link::LinkSession, types::State},
};

fn event_hook(event: &CtrlEvent) -> Option<&str> {
    match event {
        CtrlEvent::Success { hook }
        | CtrlEvent::Fail { hook }
        | CtrlEvent::Close { hook }
        | CtrlEvent::SetMaxPayloadReply { hook, .. }
        | CtrlEvent::SessionId { hook, .. }
        | CtrlEvent::AcName { hook, .. }
        | CtrlEvent::Hurl { hook, .. }
        | CtrlEvent::Motm { hook, .. } => Some(hook),
        CtrlEvent::Unknown => None,
    }
}

/// Routes one control message observed on `csock` to the right
/// `LinkSession` in `sessions` (keyed by `link_id`), or drops it with a
/// leveled log line. Never panics on malformed or unroutable input.
pub async fn route<H: LinkHost, C: GraphChannel>(
    sessions: &mut HashMap<u32, LinkSession<H>>,
    host: &H,
    channel: &C,
    registry: &ParentIfRegistry,
    pid: u32,
    csock: SockId,
    event: CtrlEvent,
) {
    let Some(hook) = event_hook(&event) else {
        tracing::trace!("control message carries no hook cookie, logged only");
        return;
    };

    if parse_listen_hook(hook).is_some() {
        tracing::trace!(hook, "listener-hook control event, handled by IncomingDispatcher");
        return;
    }

    let Some((msg_pid, link_id)) = parse_hook(hook) else {
        tracing::warn!(hook, "malformed session hook in control message, dropping");
        return;
    };

    if msg_pid != pid {
        tracing::warn!(hook, our_pid = pid, "control message for foreign pid, dropping");
        return;
    }

    let Some(session) = sessions.get_mut(&link_id) else {
        tracing::warn!(link_id, "control message for unknown link id, dropping");
        return;
    };

    match &session.parent {
        Some(parent) if parent.csock == csock => {},
        _ => {
            tracing::warn!(link_id, "control message for foreign parent, dropping");
            return;
        },
    }

    if session.state == State::Down {
        tracing::debug!(link_id, "control message for DOWN link, dropping");
        return;
    }

    session.on_ctrl_event(host, channel, registry, &event).await;
}
