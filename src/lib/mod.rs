//! Storefront environment variable tooling.
//!
//! This library parses local `.env` files and reconciles them with the
//! variables stored for a remote storefront environment. Values the remote
//! marks as secret are never diffed, pushed or overwritten.
//!
//! # Features
//!
//! - **Permissive parsing**: quoted, multi-line and `export`ed values; malformed lines are skipped
//! - **Secret-aware reconciliation**: a line diff and a push set that leave remote secrets alone
//! - **Push and pull workflows**: driven through caller-supplied [`sync::RemoteStore`] and [`sync::Prompt`]
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust
//! use storefront_env::parse::parse;
//! use storefront_env::reconcile::{reconcile, RemoteVariable};
//!
//! let local = parse("FOO=bar\nBAZ=qux");
//! let remote = vec![RemoteVariable::new("FOO", "bar")];
//!
//! let result = reconcile(&local, &remote);
//! assert!(!result.identical);
//! assert_eq!(result.push_set.unwrap().len(), 2);
//! ```

pub mod diff;
pub mod environment;
pub mod parse;
pub mod reconcile;
pub mod sync;
