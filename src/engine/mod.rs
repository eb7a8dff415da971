//! The live-extraction-and-reconciliation engine.
//!
//! One [`Engine`] instance owns everything that spans reconciliation
//! passes: the annotation state map, the mutation subscription, and the
//! debounced recomputation loop. It is constructed once per page and torn
//! down explicitly on navigation — there is no module-level state.
//!
//! Data flows one direction per cycle:
//! tree mutation → coalescer → extract → aggregate → reconcile/inject.
//! The pipeline's own writes run with notifications muted, so they never
//! count as a new input cycle.

pub mod aggregate;
pub mod coalesce;
pub mod extract;
pub mod inject;
pub mod reconcile;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::ReorderClient;
use crate::config::{CredentialStore, EngineConfig};
use crate::dom::{NodeId, Page};
use crate::notify::Notifier;

pub use aggregate::{assignee_buckets, column_bucket, status_bucket, AggregateBucket};
pub use extract::{AssigneeRef, CardView, ColumnView, Snapshot};
pub use reconcile::Reconciler;

/// How the host should treat the browser event that reached the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventDisposition {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl EventDisposition {
    fn consumed() -> Self {
        Self {
            prevent_default: true,
            stop_propagation: true,
        }
    }
}

/// One engine instance bound to one page.
pub struct Engine {
    page: Page,
    config: EngineConfig,
    client: Arc<dyn ReorderClient>,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    reconciler: Mutex<Reconciler>,
    passes: AtomicU64,
}

impl Engine {
    pub fn new(
        page: Page,
        config: EngineConfig,
        client: Arc<dyn ReorderClient>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            page,
            config,
            client,
            credentials,
            notifier,
            reconciler: Mutex::new(Reconciler::new()),
            passes: AtomicU64::new(0),
        })
    }

    /// Start the coalescer: watch for mutations and navigations and keep
    /// the board annotated until the returned task is dropped.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(coalesce::supervise(Arc::clone(self)))
    }

    pub(crate) fn page(&self) -> &Page {
        &self.page
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Completed pipeline passes since construction. Diagnostic only.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Snapshot the board as the pipeline would see it right now.
    pub fn snapshot(&self) -> Snapshot {
        let dom = self.page.lock();
        match extract::discover_board(&dom) {
            Some(board) => extract::extract(&dom, board, &self.config.estimate_pattern),
            None => Snapshot::default(),
        }
    }

    /// One full pipeline pass right now, if a board is present. The
    /// coalescer calls this after every settled mutation burst; embedders
    /// may call it to force a pass.
    pub fn refresh(&self) {
        let board = {
            let dom = self.page.lock();
            extract::discover_board(&dom)
        };
        if let Some(board) = board {
            self.run_pipeline(board);
        }
    }

    /// Extract → aggregate → reconcile → inject, in order, under one lock
    /// scope. All writes are muted and content-equality gated, so a pass
    /// over an unchanged tree mutates nothing.
    pub(crate) fn run_pipeline(&self, board: NodeId) {
        let mut dom = self.page.lock();
        if !dom.exists(board) {
            return;
        }

        let snapshot = extract::extract(&dom, board, &self.config.estimate_pattern);
        let active = aggregate::status_bucket(&snapshot, &self.config.active_columns);
        let closed = aggregate::status_bucket(&snapshot, &self.config.closed_columns);
        let per_assignee = aggregate::assignee_buckets(&snapshot, &self.config.active_columns);
        tracing::debug!(
            columns = snapshot.columns.len(),
            active_points = active.points,
            active_unestimated = active.unestimated,
            closed_points = closed.points,
            closed_unestimated = closed.unestimated,
            "reconciling board annotations"
        );

        // First-seen avatar control per assignee, for the summary clones.
        let mut avatars: HashMap<String, NodeId> = HashMap::new();
        for column in &snapshot.columns {
            for card in &column.cards {
                for assignee in &card.assignees {
                    avatars.entry(assignee.name.clone()).or_insert(assignee.avatar);
                }
            }
        }

        dom.set_muted(true);
        let mut reconciler = self.reconciler.lock().expect("reconciler lock poisoned");
        for column in &snapshot.columns {
            let bucket = aggregate::column_bucket(column);
            let Some(count) = dom.first_descendant_with_class(column.node, extract::COLUMN_CARD_COUNT)
            else {
                continue; // column without a count element: skip the field, not the pass
            };
            let fragment = reconcile::points_summary(&bucket);
            if fragment.is_empty() {
                reconciler.clear_text(&mut dom, count);
            } else {
                reconciler.replace_text(&mut dom, count, &fragment);
            }
        }
        let root = dom.root();
        if let Some(title) = dom.first_descendant_with_class(root, extract::BOARD_TITLE) {
            reconciler.upsert_child(
                &mut dom,
                title,
                reconcile::BOARD_SUMMARY,
                &reconcile::active_summary(&active),
            );
            reconciler.upsert_assignee_summary(&mut dom, title, &per_assignee, &avatars);
        }
        inject::inject_controls(&mut dom, &snapshot);
        dom.set_muted(false);

        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove every annotation and control and restore displaced content.
    /// Called on navigation; the next discovery recreates everything.
    pub fn teardown(&self) {
        let mut dom = self.page.lock();
        dom.set_muted(true);
        self.reconciler
            .lock()
            .expect("reconciler lock poisoned")
            .teardown(&mut dom);
        inject::remove_controls(&mut dom);
        dom.set_muted(false);
    }

    // ============================================================
    // Pointer events
    // ============================================================

    /// Pointer-down on a control suppresses the tree's default
    /// text-selection/focus behavior.
    pub fn on_pointer_down(&self, node: NodeId) -> EventDisposition {
        let dom = self.page.lock();
        if inject::is_control(&dom, node) {
            EventDisposition {
                prevent_default: true,
                stop_propagation: false,
            }
        } else {
            EventDisposition::default()
        }
    }

    /// Click dispatch. For a reorder control this runs the full activation
    /// flow and never propagates to the card's own navigation handler; any
    /// other node passes through untouched.
    pub async fn on_click(&self, node: NodeId) -> EventDisposition {
        let binding = {
            let dom = self.page.lock();
            inject::control_binding(&dom, node)
        };
        let Some((card_id, position)) = binding else {
            return EventDisposition::default();
        };
        let disposition = EventDisposition::consumed();

        let credentials = self.credentials.load().await;
        if !credentials.is_configured() {
            self.notifier
                .alert("please configure board credentials in the story points settings");
            return disposition;
        }

        // Pending transition happens before any network effect. A click on
        // an already-pending control is ignored rather than queued.
        {
            let mut dom = self.page.lock();
            if inject::is_pending(&dom, node) {
                tracing::debug!(%card_id, "reorder already in flight, ignoring click");
                return disposition;
            }
            dom.set_muted(true);
            dom.set_text(node, inject::GLYPH_PENDING);
            dom.set_muted(false);
        }

        match self.client.move_card(&credentials, &card_id, position).await {
            Ok(()) => {
                let mut dom = self.page.lock();
                dom.set_muted(true);
                dom.set_text(node, inject::GLYPH_SUCCESS);
                dom.set_muted(false);
                tracing::info!(%card_id, position = position.as_str(), "card reordered");
            }
            Err(err) => {
                {
                    let mut dom = self.page.lock();
                    dom.set_muted(true);
                    dom.set_text(node, inject::idle_glyph(position));
                    dom.set_muted(false);
                }
                tracing::error!(%card_id, error = %err, "card reorder failed");
                self.notifier.alert(&format!("card reorder failed: {}", err));
            }
        }
        disposition
    }
}
