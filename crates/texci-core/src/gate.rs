//! N-of-N completion gate.
//!
//! A gate is created with the full set of keys it waits for. Each key may be
//! signalled once; the signal that completes the set is the only one that
//! observes [`Signal::Opened`], which makes the "all done" transition
//! idempotent no matter how the signals interleave.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Mutex;

use tracing::warn;

/// Result of signalling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Recorded; this many keys are still outstanding.
    Waiting { remaining: usize },
    /// Recorded, and this signal completed the set.
    Opened,
    /// The key was already signalled; ignored.
    Duplicate,
    /// The gate does not wait for this key; ignored.
    Unknown,
}

#[derive(Debug)]
struct GateState<K> {
    pending: HashSet<K>,
    done: HashSet<K>,
}

/// Waits for every registered key to be signalled exactly once.
#[derive(Debug)]
pub struct CompletionGate<K> {
    state: Mutex<GateState<K>>,
}

impl<K> CompletionGate<K>
where
    K: Eq + Hash + Copy + Debug,
{
    /// A gate with no keys is open from the start and never reports `Opened`.
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            state: Mutex::new(GateState {
                pending: keys.into_iter().collect(),
                done: HashSet::new(),
            }),
        }
    }

    pub fn signal(&self, key: K) -> Signal {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        if state.done.contains(&key) {
            warn!(key = ?key, "completion signalled twice, ignoring");
            return Signal::Duplicate;
        }
        if !state.pending.remove(&key) {
            warn!(key = ?key, "completion signalled for unknown key, ignoring");
            return Signal::Unknown;
        }
        state.done.insert(key);

        if state.pending.is_empty() {
            Signal::Opened
        } else {
            Signal::Waiting {
                remaining: state.pending.len(),
            }
        }
    }

    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.pending.is_empty()
    }

    pub fn is_done(&self, key: K) -> bool {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.done.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_opens_after_all_keys() {
        let gate = CompletionGate::new(["a", "b", "c"]);
        assert!(!gate.is_open());
        assert_eq!(gate.signal("b"), Signal::Waiting { remaining: 2 });
        assert_eq!(gate.signal("a"), Signal::Waiting { remaining: 1 });
        assert!(!gate.is_open());
        assert_eq!(gate.signal("c"), Signal::Opened);
        assert!(gate.is_open());
    }

    #[test]
    fn test_duplicate_and_unknown_signals_ignored() {
        let gate = CompletionGate::new([1u8, 2u8]);
        assert_eq!(gate.signal(1), Signal::Waiting { remaining: 1 });
        assert_eq!(gate.signal(1), Signal::Duplicate);
        assert_eq!(gate.signal(9), Signal::Unknown);
        assert!(!gate.is_open());
        assert!(gate.is_done(1));
        assert!(!gate.is_done(2));
        assert_eq!(gate.signal(2), Signal::Opened);
        assert_eq!(gate.signal(2), Signal::Duplicate);
    }

    #[test]
    fn test_empty_gate_is_open() {
        let gate: CompletionGate<u8> = CompletionGate::new([]);
        assert!(gate.is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signals_open_exactly_once() {
        let keys: Vec<u32> = (0..64).collect();
        let gate = Arc::new(CompletionGate::new(keys.clone()));

        let mut handles = Vec::new();
        for key in keys {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move { gate.signal(key) }));
        }

        let mut opened = 0;
        for handle in handles {
            if handle.await.expect("task") == Signal::Opened {
                opened += 1;
            }
        }
        assert_eq!(opened, 1);
        assert!(gate.is_open());
    }
}
