//! Mutation coalescing and engine lifecycle across navigations.
//!
//! The observed tree produces a high-frequency stream of change
//! notifications with no consistency or ordering guarantees. The coalescer
//! turns that stream into a bounded rate of pipeline runs: a trailing-edge
//! debounce defers the run while a burst lasts and fires exactly once after
//! the configured quiet period. Navigation tears the engine's region state
//! down wholesale and re-discovers the board from scratch — the engine has
//! no identity across navigations.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::dom::NodeId;
use crate::engine::{extract, Engine};

enum WatchExit {
    Navigated,
    HostGone,
}

/// Supervisor task: discover the board, annotate it, watch it, and start
/// over on every navigation. Runs until the host drops its side of the
/// page.
pub(crate) async fn supervise(engine: Arc<Engine>) {
    let mut nav = engine.page().navigation_signal();
    loop {
        let Some(board) = discover_with_retry(&engine).await else {
            // Not a board page. A valid state: stay idle until navigation.
            tracing::debug!("no board region on this page, idling until navigation");
            match nav.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
            sleep(engine.config().settle_delay).await;
            continue;
        };

        let (subscription, mut mutations) = {
            let mut dom = engine.page().lock();
            dom.subscribe(board)
        };
        engine.run_pipeline(board);

        let exit = watch(&engine, board, &mut mutations, &mut nav).await;

        {
            let mut dom = engine.page().lock();
            dom.unsubscribe(subscription);
        }
        engine.teardown();

        match exit {
            WatchExit::HostGone => return,
            WatchExit::Navigated => {
                tracing::debug!("navigation observed, restarting board discovery");
                sleep(engine.config().settle_delay).await;
            }
        }
    }
}

/// Debounce loop for one attached region. Returns when navigation occurs
/// or the host goes away.
async fn watch(
    engine: &Engine,
    board: NodeId,
    mutations: &mut mpsc::UnboundedReceiver<()>,
    nav: &mut broadcast::Receiver<()>,
) -> WatchExit {
    loop {
        tokio::select! {
            result = nav.recv() => {
                return match result {
                    Err(RecvError::Closed) => WatchExit::HostGone,
                    _ => WatchExit::Navigated,
                };
            }
            changed = mutations.recv() => {
                if changed.is_none() {
                    return WatchExit::HostGone;
                }
                // Trailing-edge debounce: every further notification defers
                // the run; it fires once, after the burst settles.
                loop {
                    tokio::select! {
                        _ = sleep(engine.config().quiet_period) => {
                            engine.run_pipeline(board);
                            break;
                        }
                        more = mutations.recv() => {
                            if more.is_none() {
                                return WatchExit::HostGone;
                            }
                        }
                        result = nav.recv() => {
                            return match result {
                                Err(RecvError::Closed) => WatchExit::HostGone,
                                _ => WatchExit::Navigated,
                            };
                        }
                    }
                }
            }
        }
    }
}

/// Bounded poll for the board container after a navigation. The host
/// renders the board asynchronously, so a single probe right after the
/// settle delay can miss it; retry a configured number of times before
/// going idle until the next navigation.
async fn discover_with_retry(engine: &Engine) -> Option<NodeId> {
    let attempts = engine.config().discover_attempts.max(1);
    for attempt in 1..=attempts {
        let found = {
            let dom = engine.page().lock();
            extract::discover_board(&dom)
        };
        if found.is_some() {
            return found;
        }
        if attempt < attempts {
            sleep(engine.config().discover_interval).await;
        }
    }
    tracing::debug!(attempts, "board region did not appear, giving up until next navigation");
    None
}
