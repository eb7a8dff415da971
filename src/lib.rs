//! Story point annotations for live kanban project boards.
//!
//! # Core Concepts
//!
//! A project board is rendered as a live node tree that the host keeps
//! mutating: drag-and-drop reorders cards, pagination adds them, and
//! navigation replaces whole regions wholesale. This crate observes that
//! tree, derives story point estimates from card labels, and injects
//! non-persistent annotations and reorder controls back into it.
//!
//! - [`dom`]: the observed region — a generic mutable node tree with
//!   mutation subscriptions and a navigation signal. The host owns and
//!   mutates it; the engine only reads it and writes annotation nodes.
//! - [`engine`]: the extraction/aggregation/reconciliation pipeline and the
//!   debounced coalescer that drives it. All engine structures are
//!   disposable views rebuilt every pass; the tree stays the source of
//!   truth.
//! - [`client`]: the remote reorder boundary backing the per-card
//!   move-to-top/bottom controls.
//! - [`config`]: engine tuning plus the credential provider boundary.

pub mod client;
pub mod config;
pub mod dom;
pub mod engine;
pub mod notify;

pub use client::{ClientError, HttpReorderClient, Position, ReorderClient};
pub use config::{CredentialStore, Credentials, EngineConfig, EnvCredentials, StaticCredentials};
pub use dom::{Dom, NodeId, Page};
pub use engine::{Engine, EventDisposition, Snapshot};
pub use notify::{LogNotifier, Notifier};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for embedders that don't bring their own subscriber.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "boardpoints=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
