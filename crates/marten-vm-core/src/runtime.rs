//! Runtime
//!
//! The runtime owns the atom table, the symbol registry and well-known
//! symbols, the interrupt flag, the context id space, and the finalization
//! monitor thread. Contexts are handed to the embedder and may live on
//! separate threads as long as no object reference crosses them; the pieces
//! here are the only shared resources.

use marten_vm_gc::WeakGc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::atom::AtomTable;
use crate::context::Context;
use crate::object::JsObject;
use crate::symbol::{SymbolRegistry, WellKnownSymbols};

/// How often the finalization monitor polls the watch list.
const MONITOR_INTERVAL: Duration = Duration::from_millis(20);

struct FinalizationWatch {
    target: WeakGc<JsObject>,
    hint: Arc<AtomicBool>,
}

/// The engine runtime.
pub struct Runtime {
    atoms: AtomTable,
    symbols: SymbolRegistry,
    well_known: WellKnownSymbols,
    interrupt: Arc<AtomicBool>,
    next_context_id: AtomicU64,
    live_contexts: AtomicUsize,
    watches: Arc<Mutex<Vec<FinalizationWatch>>>,
    monitor_shutdown: Arc<AtomicBool>,
    monitor: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Runtime {
    /// Create a runtime with its finalization monitor running.
    pub fn new() -> Arc<Self> {
        let watches: Arc<Mutex<Vec<FinalizationWatch>>> = Arc::new(Mutex::new(Vec::new()));
        let monitor_shutdown = Arc::new(AtomicBool::new(false));

        let monitor_watches = watches.clone();
        let monitor_stop = monitor_shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("marten-finalization".to_string())
            .spawn(move || {
                // The monitor only observes liveness and raises sweep hints;
                // cleanup callbacks run on the owning context's thread.
                while !monitor_stop.load(Ordering::SeqCst) {
                    {
                        let mut watches = monitor_watches.lock();
                        watches.retain(|w| {
                            if w.target.is_alive() {
                                true
                            } else {
                                w.hint.store(true, Ordering::SeqCst);
                                false
                            }
                        });
                    }
                    std::thread::sleep(MONITOR_INTERVAL);
                }
            })
            .expect("failed to spawn finalization monitor");

        Arc::new(Self {
            atoms: AtomTable::new(),
            symbols: SymbolRegistry::new(),
            well_known: WellKnownSymbols::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            next_context_id: AtomicU64::new(1),
            live_contexts: AtomicUsize::new(0),
            watches,
            monitor_shutdown,
            monitor: Mutex::new(Some(handle)),
        })
    }

    /// Create a new isolated context.
    pub fn create_context(self: &Arc<Self>) -> Context {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        self.live_contexts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(context = id, "creating context");
        Context::new(self.clone(), id)
    }

    /// The runtime-wide atom table.
    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    /// The symbol registry (`Symbol.for`).
    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    /// The well-known symbols.
    pub fn well_known(&self) -> &WellKnownSymbols {
        &self.well_known
    }

    /// The shared interrupt flag; the VM checks it on back-edges.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Request interruption of all contexts.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Clear the interrupt flag.
    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }

    /// Number of live contexts.
    pub fn context_count(&self) -> usize {
        self.live_contexts.load(Ordering::Relaxed)
    }

    /// Watch `target`; when it becomes unreachable, raise `hint` so the
    /// owning context sweeps its registries at the next drain boundary.
    pub(crate) fn watch_finalization(&self, target: WeakGc<JsObject>, hint: Arc<AtomicBool>) {
        self.watches.lock().push(FinalizationWatch { target, hint });
    }

    pub(crate) fn context_dropped(&self, id: u64) {
        tracing::debug!(context = id, "context dropped");
        self.live_contexts.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.monitor_shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.monitor.lock().take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("atoms", &self.atoms.len())
            .field("contexts", &self.context_count())
            .finish()
    }
}
