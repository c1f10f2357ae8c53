// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The contract with the daemon's generic link framework (spec §6,
//! "Dependency contract with the host"). This subsystem never touches the
//! host's internals directly — it only calls through [`LinkHost`], so the
//! host implementation (link enumeration, template/instance materialization,
//! PPP-layer negotiation) stays an external collaborator per spec §1.

/// Reason code attached to a `PhysDown` notification. Mirrors
/// `STR_ERROR` / `STR_CON_FAILED0` / `STR_MANUALLY` / `STR_DROPPED` from the
/// host framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysDownReason {
    /// A graph-level send/receive failed outright.
    Error,
    /// The 9-second connect timer expired, or the peer sent `FAIL`.
    ConFailed,
    /// The user (or `shutdown()`) closed the link.
    Manually,
    /// The peer sent `CLOSE` on an already-connected session.
    Dropped,
}

/// A link-framework option flag this subsystem inspects or mutates.
/// Corresponds to bits in the host's `options` bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOpt {
    /// Link accepts incoming sessions (used by `IncomingDispatcher`'s
    /// template-matching scan).
    Incoming,
    /// ACFC (Address-and-Control-Field-Compression), disabled/denied by
    /// `open()` per RFC 2516.
    Acfcomp,
}

/// The upper hook a link's PPP engine exposes, as reported by
/// `PhysGetUpperHook`: a graph path plus the hook name on that path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpperHook {
    pub path: String,
    pub hook: String,
}

/// Abstract handle to "the daemon's generic link framework" (spec §6).
///
/// A concrete host owns `gLinks`/`gNumLinks`, link templates/instances, and
/// PPP-layer negotiation; none of that lives in this crate. Implementations
/// are expected to be cheap to clone (an `Arc<...>` wrapper, a bare integer
/// index, or similar) since the subsystem calls through this on every state
/// transition.
///
/// This crate calls `LinkHost` through a generic type parameter rather than
/// a trait object, so implementations may use `async fn` directly (no
/// boxing required).
pub trait LinkHost: Send + Sync + 'static {
    /// Opaque link identifier type the host assigns.
    type LinkId: Copy + Eq + std::hash::Hash + Send + Sync + std::fmt::Debug + 'static;

    /// Queries the link's PPP-engine upper hook (`PhysGetUpperHook`).
    async fn phys_get_upper_hook(&self, link: Self::LinkId) -> UpperHook;

    /// Notifies the host the link reached `UP`.
    async fn phys_up(&self, link: Self::LinkId);

    /// Notifies the host the link fell to `DOWN`, with a reason and a
    /// free-form detail string for logging.
    async fn phys_down(&self, link: Self::LinkId, reason: PhysDownReason, detail: &str);

    /// Notifies the host an incoming session is being accepted
    /// (`PhysIncoming`).
    async fn phys_incoming(&self, link: Self::LinkId);

    /// True if the host considers `link` busy (already negotiating or up)
    /// and therefore not a candidate for `IncomingDispatcher`'s scan.
    async fn phys_is_busy(&self, link: Self::LinkId) -> bool;

    /// True if `opt` is enabled in the link's configured options.
    async fn enabled(&self, link: Self::LinkId, opt: LinkOpt) -> bool;

    /// Disables and denies `opt` (used by `open()` to turn off ACFC).
    async fn disable_deny(&self, link: Self::LinkId, opt: LinkOpt);

    /// Materializes a runnable instance from a template link
    /// (`LinkInst`). Returns the new instance's id.
    async fn link_inst(&self, template: Self::LinkId) -> Self::LinkId;

    /// Tears down a non-static link instance (`LinkShutdown`).
    async fn link_shutdown(&self, link: Self::LinkId);

    /// True if `link` is a template (as opposed to a runnable instance).
    async fn is_template(&self, link: Self::LinkId) -> bool;

    /// True if `link` is a "stay" (static) instance that must not be torn
    /// down by `IncomingDispatcher` on failure.
    async fn is_static(&self, link: Self::LinkId) -> bool;

    /// `OVERLOAD()`: true if the host is shutting down or too busy to
    /// accept a new incoming session (spec §5). `IncomingDispatcher`
    /// queries this once per incoming frame and drops silently if true.
    async fn overloaded(&self) -> bool;
}

/// An in-memory [`LinkHost`] that records every call, used by this crate's
/// own tests and available to downstream integration tests (kept alongside
/// [`crate::graph::fake::FakeGraphChannel`], not `#[cfg(test)]`-gated, for
/// the same reason: it must be visible from `tests/`).
pub mod test_support {
    use std::{
        collections::HashSet,
        sync::Mutex,
    };

    use super::*;

    /// Deterministic offset a materialized instance's id is given relative
    /// to its template id, so tests can tell the two apart.
    const INSTANCE_ID_OFFSET: u32 = 500;

    #[derive(Default)]
    struct Recorded {
        phys_up: u32,
        phys_down: Vec<PhysDownReason>,
        phys_incoming: u32,
        link_inst_calls: Vec<u32>,
        link_shutdown_calls: Vec<u32>,
        busy: HashSet<u32>,
        incoming_enabled: HashSet<u32>,
        templates: HashSet<u32>,
        statics: HashSet<u32>,
        overloaded: bool,
    }

    /// An in-memory [`LinkHost`] that records every call and lets a test
    /// configure busy/enabled/template/static/overload state per link id.
    pub struct RecordingHost {
        recorded: Mutex<Recorded>,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self {
                recorded: Mutex::new(Recorded::default()),
            }
        }

        fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
            self.recorded.lock().expect("recorded mutex poisoned")
        }

        pub fn phys_up_calls(&self) -> u32 {
            self.recorded().phys_up
        }

        pub fn phys_down_reasons(&self) -> Vec<PhysDownReason> {
            self.recorded().phys_down.clone()
        }

        pub fn phys_incoming_calls(&self) -> u32 {
            self.recorded().phys_incoming
        }

        pub fn link_inst_calls(&self) -> Vec<u32> {
            self.recorded().link_inst_calls.clone()
        }

        pub fn link_shutdown_calls(&self) -> Vec<u32> {
            self.recorded().link_shutdown_calls.clone()
        }

        pub fn set_busy(&self, link: u32, busy: bool) {
            let mut r = self.recorded();
            if busy { r.busy.insert(link); } else { r.busy.remove(&link); }
        }

        pub fn set_incoming_enabled(&self, link: u32, enabled: bool) {
            let mut r = self.recorded();
            if enabled { r.incoming_enabled.insert(link); } else { r.incoming_enabled.remove(&link); }
        }

        pub fn set_template(&self, link: u32, is_template: bool) {
            let mut r = self.recorded();
            if is_template { r.templates.insert(link); } else { r.templates.remove(&link); }
        }

        pub fn set_static(&self, link: u32, is_static: bool) {
            let mut r = self.recorded();
            if is_static { r.statics.insert(link); } else { r.statics.remove(&link); }
        }

        pub fn set_overloaded(&self, overloaded: bool) {
            self.recorded().overloaded = overloaded;
        }
    }

    impl Default for RecordingHost {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LinkHost for RecordingHost {
        type LinkId = u32;

        async fn phys_get_upper_hook(&self, _link: Self::LinkId) -> UpperHook {
            UpperHook {
                path: String::new(),
                hook: String::new(),
            }
        }

        async fn phys_up(&self, _link: Self::LinkId) {
            self.recorded().phys_up += 1;
        }

        async fn phys_down(&self, _link: Self::LinkId, reason: PhysDownReason, _detail: &str) {
            self.recorded().phys_down.push(reason);
        }

        async fn phys_incoming(&self, _link: Self::LinkId) {
            self.recorded().phys_incoming += 1;
        }

        async fn phys_is_busy(&self, link: Self::LinkId) -> bool {
            self.recorded().busy.contains(&link)
        }

        async fn enabled(&self, link: Self::LinkId, opt: LinkOpt) -> bool {
            match opt {
                LinkOpt::Incoming => self.recorded().incoming_enabled.contains(&link),
                LinkOpt::Acfcomp => false,
            }
        }

        async fn disable_deny(&self, _link: Self::LinkId, _opt: LinkOpt) {}

        async fn link_inst(&self, template: Self::LinkId) -> Self::LinkId {
            self.recorded().link_inst_calls.push(template);
            template + INSTANCE_ID_OFFSET
        }

        async fn link_shutdown(&self, link: Self::LinkId) {
            self.recorded().link_shutdown_calls.push(link);
        }

        async fn is_template(&self, link: Self::LinkId) -> bool {
            self.recorded().templates.contains(&link)
        }

        async fn is_static(&self, link: Self::LinkId) -> bool {
            self.recorded().statics.contains(&link)
        }

        async fn overloaded(&self) -> bool {
            self.recorded().overloaded
        }
    }
}
