// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-session hook name `mpd<pid>-<link_id>` is a string-based
//! multiplexing channel between this process and the forwarding graph: the
//! graph node's hook name is the only thing that survives the round-trip
//! through an async control message back to [`crate::dispatch::ctrl_demux`].
//!
//! Per spec §9 ("hook-name routing"), parse/format live in exactly one
//! place so every caller rejects the same malformed input the same way.

/// Builds the session hook name for `link_id` owned by the process `pid`.
pub fn format_hook(pid: u32, link_id: u32) -> String {
    format!("mpd{pid}-{link_id}")
}

/// Parses a session hook name of the form `mpd<pid>-<link_id>`, returning
/// `(pid, link_id)`. Returns `None` for anything else, including
/// `listen-*` hooks (those are routed by [`crate::dispatch::incoming`], not
/// this parser) and out-of-range integers.
pub fn parse_hook(hook: &str) -> Option<(u32, u32)> {
    let rest = hook.strip_prefix("mpd")?;
    let dash = rest.find('-')?;
    let (pid_str, link_str) = rest.split_at(dash);
    let link_str = &link_str[1..];

    if pid_str.is_empty() || link_str.is_empty() {
        return None;
    }
    if !pid_str.bytes().all(|b| b.is_ascii_digit())
        || !link_str.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let pid: u32 = pid_str.parse().ok()?;
    let link_id: u32 = link_str.parse().ok()?;
    Some((pid, link_id))
}

/// Returns the service name embedded in a `listen-<service>` hook, or
/// `None` if `hook` does not have that prefix.
pub fn parse_listen_hook(hook: &str) -> Option<&str> {
    hook.strip_prefix("listen-")
}

/// Builds the listener hook name for `service`.
pub fn format_listen_hook(service: &str) -> String {
    format!("listen-{service}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hook = format_hook(4242, 7);
        assert_eq!(hook, "mpd4242-7");
        assert_eq!(parse_hook(&hook), Some((4242, 7)));
    }

    #[test]
    fn rejects_non_numeric() {
        assert_eq!(parse_hook("mpd42-abc"), None);
        assert_eq!(parse_hook("mpdxx-7"), None);
        assert_eq!(parse_hook("mpd42-"), None);
        assert_eq!(parse_hook("mpd-7"), None);
        assert_eq!(parse_hook("notmpd42-7"), None);
    }

    #[test]
    fn rejects_listen_hooks() {
        assert_eq!(parse_hook("listen-isp"), None);
        assert_eq!(parse_listen_hook("listen-isp"), Some("isp"));
        assert_eq!(parse_listen_hook("mpd42-7"), None);
    }

    #[test]
    fn listen_hook_round_trips() {
        assert_eq!(format_listen_hook("isp"), "listen-isp");
        assert_eq!(parse_listen_hook(&format_listen_hook("isp")), Some("isp"));
    }
}
