//! Lazily-initialised shared engine with a single in-flight load.
//!
//! Loading the PDF engine binds a native library, which is slow and must not
//! happen twice. [`EngineCell`] holds one of three states:
//!
//! ```text
//! Empty ──get_or_init──▶ Pending(shared load) ──ok──▶ Ready(engine)
//!   ▲                          │
//!   └───────────── err ────────┘
//! ```
//!
//! The first caller creates the load future and parks a [`Shared`] handle to
//! it in the cell; every concurrent caller clones that handle and awaits the
//! same load, so all of them observe the same engine or the same error. A
//! failed load puts the cell back to `Empty` so a later call can retry.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Boxed future that loads an engine.
pub type EngineFuture<T> = BoxFuture<'static, Result<Arc<T>, String>>;

enum Slot<T: ?Sized> {
    Empty,
    Pending {
        generation: u64,
        load: Shared<EngineFuture<T>>,
    },
    Ready(Arc<T>),
}

struct CellState<T: ?Sized> {
    slot: Slot<T>,
    generation: u64,
}

/// A "once" cell whose initialiser is async and shared between callers.
pub struct EngineCell<T: ?Sized> {
    state: Mutex<CellState<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> EngineCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState {
                slot: Slot::Empty,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The engine, if it has finished loading.
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.lock().slot {
            Slot::Ready(engine) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.lock().slot, Slot::Pending { .. })
    }

    /// Return the engine, starting `init` only if no load is ready or running.
    ///
    /// `init` is called at most once per load attempt and only by the caller
    /// that finds the cell empty.
    pub async fn get_or_init<F>(&self, init: F) -> Result<Arc<T>, String>
    where
        F: FnOnce() -> EngineFuture<T>,
    {
        let (generation, load) = {
            let mut state = self.lock();
            match &state.slot {
                Slot::Ready(engine) => return Ok(Arc::clone(engine)),
                Slot::Pending { generation, load } => {
                    debug!("Engine load already in flight; waiting on it");
                    (*generation, load.clone())
                }
                Slot::Empty => {
                    state.generation += 1;
                    let generation = state.generation;
                    let load = init().shared();
                    state.slot = Slot::Pending {
                        generation,
                        load: load.clone(),
                    };
                    debug!("Starting engine load #{generation}");
                    (generation, load)
                }
            }
        };

        let result = load.await;

        let mut state = self.lock();
        let still_current = matches!(
            &state.slot,
            Slot::Pending { generation: g, .. } if *g == generation
        );
        if still_current {
            state.slot = match &result {
                Ok(engine) => Slot::Ready(Arc::clone(engine)),
                Err(e) => {
                    warn!("Engine load #{generation} failed: {e}");
                    Slot::Empty
                }
            };
        }
        result
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for EngineCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_loader(
        loads: Arc<AtomicUsize>,
        outcome: Result<u32, &'static str>,
    ) -> impl FnOnce() -> EngineFuture<u32> {
        move || {
            async move {
                loads.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                outcome.map(Arc::new).map_err(str::to_string)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let cell = Arc::new(EngineCell::<u32>::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    cell.get_or_init(counting_loader(loads, Ok(7))).await
                })
            })
            .collect();

        for h in handles {
            assert_eq!(*h.await.unwrap().unwrap(), 7);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get().as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failure_then_retry() {
        let cell = Arc::new(EngineCell::<u32>::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let results = futures::future::join_all((0..4).map(|_| {
            cell.get_or_init(counting_loader(Arc::clone(&loads), Err("no library")))
        }))
        .await;

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_ref().unwrap_err() == "no library"));
        assert!(cell.get().is_none());
        assert!(!cell.is_loading());

        let engine = cell
            .get_or_init(counting_loader(Arc::clone(&loads), Ok(3)))
            .await
            .unwrap();
        assert_eq!(*engine, 3);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ready_engine_skips_init() {
        let cell = EngineCell::<u32>::new();
        let loads = Arc::new(AtomicUsize::new(0));
        cell.get_or_init(counting_loader(Arc::clone(&loads), Ok(1)))
            .await
            .unwrap();
        cell.get_or_init(|| -> EngineFuture<u32> { panic!("must not reload") })
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
