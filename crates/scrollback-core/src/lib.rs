//! scrollback-core library.
//!
//! Keeps a rendered, grouped chat timeline in step with a changing message
//! list without re-rendering it. Messages are grouped into
//! day → recipient → sender-run → message sections ([`group`]), two
//! grouped states are compared into an edit sequence ([`generate`]), and the
//! sequence is applied to a caller-owned [`LiveTree`] ([`apply`]).
//! [`Reconciler`] runs the whole loop and rebuilds the live tree when an edit
//! sequence does not fit it.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums with an [`error::ErrorCode`] in the
//!   library; `anyhow::Result` for config loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod diff;
pub mod edit;
pub mod element;
pub mod error;
pub mod group;
pub mod live;
pub mod model;
pub mod render;
pub mod session;

pub use diff::{RenderState, generate};
pub use edit::{EditOp, OpCounts};
pub use element::{ElementTree, NodeKey, NodePath};
pub use group::{Grouper, group};
pub use live::{ApplyStats, IntegrityError, LiveTree, apply};
pub use render::RenderedNode;
pub use session::{Reconciler, UpdateOutcome};
