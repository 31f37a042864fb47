//! Core placement for the pipeline threads.
//!
//! The producer gets the first available core to itself; workers spread
//! across the remaining cores, cycling when the pool is larger than the
//! machine. Pinning keeps a worker's caches hot across batches but only
//! pays off on machines with isolated cores, so it is opt-in.

use core_affinity::CoreId;
use std::thread;

/// Which core each pipeline thread runs on. `None` entries leave the thread
/// to the OS scheduler.
pub struct CoreAssignment {
    producer_core: Option<CoreId>,
    worker_cores: Vec<CoreId>,
}

impl CoreAssignment {
    /// Detect an assignment from the machine's core list.
    ///
    /// When pinning is disabled, or no core ids can be enumerated, every
    /// assignment is `None` and threads float.
    pub fn detect(pin: bool) -> Self {
        if !pin {
            return Self::unpinned();
        }
        match core_affinity::get_core_ids() {
            Some(cores) if cores.len() > 1 => Self {
                producer_core: Some(cores[0]),
                worker_cores: cores[1..].to_vec(),
            },
            Some(cores) if cores.len() == 1 => Self {
                // Single core: everyone shares it, pinning is moot.
                producer_core: Some(cores[0]),
                worker_cores: cores,
            },
            _ => {
                eprintln!("[THREAD-PIN] no core ids available, running unpinned");
                Self::unpinned()
            }
        }
    }

    pub fn unpinned() -> Self {
        Self {
            producer_core: None,
            worker_cores: Vec::new(),
        }
    }

    pub fn producer_core(&self) -> Option<CoreId> {
        self.producer_core
    }

    /// Workers cycle through the non-producer cores when oversubscribed.
    pub fn worker_core(&self, worker_id: usize) -> Option<CoreId> {
        if self.worker_cores.is_empty() {
            None
        } else {
            Some(self.worker_cores[worker_id % self.worker_cores.len()])
        }
    }
}

fn pin_current_thread(core: CoreId, thread_name: &str) {
    if core_affinity::set_for_current(core) {
        eprintln!("[THREAD-PIN] {} pinned to core {}", thread_name, core.id);
    } else {
        eprintln!(
            "[THREAD-PIN] failed to pin {} to core {}, running unpinned",
            thread_name, core.id
        );
    }
}

/// Spawn a thread, pinning it to `core` first when one is assigned.
pub fn spawn_pinned_thread<F, T>(core: Option<CoreId>, name: &str, f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let thread_name = name.to_string();
    thread::spawn(move || {
        if let Some(core) = core {
            pin_current_thread(core, &thread_name);
        }
        f()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpinned_assignment() {
        let assignment = CoreAssignment::unpinned();
        assert!(assignment.producer_core().is_none());
        assert!(assignment.worker_core(0).is_none());
        assert!(assignment.worker_core(17).is_none());
    }

    #[test]
    fn test_detect_disabled_is_unpinned() {
        let assignment = CoreAssignment::detect(false);
        assert!(assignment.producer_core().is_none());
        assert!(assignment.worker_core(0).is_none());
    }

    #[test]
    fn test_workers_cycle_over_cores() {
        let assignment = CoreAssignment {
            producer_core: Some(CoreId { id: 0 }),
            worker_cores: vec![CoreId { id: 1 }, CoreId { id: 2 }, CoreId { id: 3 }],
        };
        assert_eq!(assignment.worker_core(0).unwrap().id, 1);
        assert_eq!(assignment.worker_core(2).unwrap().id, 3);
        assert_eq!(assignment.worker_core(3).unwrap().id, 1);
        assert_eq!(assignment.worker_core(7).unwrap().id, 2);
    }

    #[test]
    fn test_spawn_pinned_thread_runs_closure() {
        let handle = spawn_pinned_thread(None, "test", || 7);
        assert_eq!(handle.join().unwrap(), 7);
    }
}
