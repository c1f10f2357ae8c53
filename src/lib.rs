// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A PPPoE (RFC 2516) link-layer subsystem for a multi-link PPP daemon:
//! discovery-stage wire format, per-interface parent attachment, outgoing
//! and incoming session state machines, and the control/data routing
//! layer that ties them to a generic link-framework host.

pub mod cfg;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod hook_name;
pub mod host;
pub mod session;
pub mod wire;
