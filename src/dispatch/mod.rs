// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Routing layer above [`crate::session::LinkSession`]: correlating
//! asynchronous control messages back to the link they belong to
//! (spec §4.5) and accepting incoming discovery frames onto a waiting
//! link (spec §4.6). Both modules are plain functions operating on
//! caller-supplied state; the single-threaded `tokio::select!` loop that
//! owns that state per parent interface (spec §5) is the host binary's
//! responsibility, not this crate's.

pub mod ctrl_demux;
pub mod incoming;
