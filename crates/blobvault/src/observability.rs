//! `tracing` span/event names used throughout the crate (§10.B).
//!
//! This module installs nothing: no subscriber, no global state. It exists
//! so callers wiring up their own `tracing-subscriber` have one place to
//! find the names this crate emits under.
//!
//! Spans carry counts only (cluster counts, byte counts) -- never
//! codenames or plaintext, since logging either at `info` or above would
//! itself be a side channel. Emit at `debug`/`trace`.
//!
//! | span/event      | emitted by         | fields                        |
//! |------------------|---------------------|--------------------------------|
//! | `vault.set`      | `Container::set`    | `part_count`, `decoy_count`   |
//! | `vault.get`      | `Container::get`    | `found: bool`                 |
//! | `vault.delete`   | `Container::delete` | `decoy_count`                 |
//! | `vault.scan`     | `namegroup::locate` | `real_count`, `decoy_count`   |
//! | `vault.update`   | `update::build_new_cluster_list` | `cluster_count` |

/// Span name entered around `Container::set`.
pub const SET_SPAN: &str = "vault.set";
/// Span name entered around `Container::get`.
pub const GET_SPAN: &str = "vault.get";
/// Span name entered around `Container::delete`.
pub const DELETE_SPAN: &str = "vault.delete";
/// Span name entered around a name-group scan.
pub const SCAN_SPAN: &str = "vault.scan";
/// Span name entered around a whole-container rewrite.
pub const UPDATE_SPAN: &str = "vault.update";
