//! Request fingerprints and in-flight coalescing.
//!
//! Identical requests from the same caller share one computation while it
//! runs: the first caller computes, later ones block and receive a clone of
//! its result. Nothing is cached after the computation finishes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParseError;

/// blake3 digest of a request's canonical JSON encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fingerprints any serializable request.
///
/// Pass a canonical form (see
/// [`GenerationRequest::canonical`](crate::pipeline::GenerationRequest::canonical))
/// so listing order does not change the key.
///
/// # Errors
/// [`ParseError::Malformed`] if the value cannot be encoded as JSON.
pub fn fingerprint<T: Serialize>(request: &T) -> Result<Fingerprint, ParseError> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, request)
        .map_err(|e| ParseError::Malformed(format!("cannot encode request: {e}")))?;
    Ok(Fingerprint(*hasher.finalize().as_bytes()))
}

/// Coalescing key: the caller's opaque identity plus the request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub caller: String,
    pub fingerprint: Fingerprint,
}

impl DedupKey {
    pub fn new(caller: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            caller: caller.into(),
            fingerprint,
        }
    }
}

enum Flight<T> {
    Running { waiters: usize },
    Done(T),
    Abandoned,
}

struct Slot<T> {
    flight: Mutex<Flight<T>>,
    landed: Condvar,
}

/// Runs at most one computation per key at a time.
pub struct RequestCoalescer<T> {
    in_flight: Mutex<HashMap<DedupKey, Arc<Slot<T>>>>,
}

impl<T> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

/// Publishes the leader's outcome, or abandons the flight if the leader
/// unwinds before finishing.
struct Leader<'a, T> {
    coalescer: &'a RequestCoalescer<T>,
    key: &'a DedupKey,
    slot: &'a Slot<T>,
    finished: bool,
}

impl<T> Leader<'_, T> {
    fn land(&mut self, state: Flight<T>) {
        self.coalescer.in_flight.lock().remove(self.key);
        *self.slot.flight.lock() = state;
        self.slot.landed.notify_all();
        self.finished = true;
    }
}

impl<T> Drop for Leader<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.land(Flight::Abandoned);
        }
    }
}

impl<T: Clone> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `compute` for `key` unless an identical computation is already
    /// running, in which case waits for it and returns a clone of its result.
    ///
    /// If the running computation panics, waiting callers run `compute`
    /// themselves.
    pub fn run<F>(&self, key: &DedupKey, compute: F) -> T
    where
        F: FnOnce() -> T,
    {
        let (slot, leading) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot {
                        flight: Mutex::new(Flight::Running { waiters: 0 }),
                        landed: Condvar::new(),
                    });
                    in_flight.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if leading {
            let mut leader = Leader {
                coalescer: self,
                key,
                slot: &slot,
                finished: false,
            };
            let value = compute();
            leader.land(Flight::Done(value.clone()));
            return value;
        }

        let mut flight = slot.flight.lock();
        if let Flight::Running { waiters } = &mut *flight {
            *waiters += 1;
        }
        debug!(caller = %key.caller, fingerprint = %key.fingerprint, "Joined in-flight request");
        loop {
            match &*flight {
                Flight::Done(value) => return value.clone(),
                Flight::Abandoned => break,
                Flight::Running { .. } => slot.landed.wait(&mut flight),
            }
        }
        drop(flight);
        compute()
    }

    /// Callers currently blocked on the computation for `key`.
    pub fn waiting(&self, key: &DedupKey) -> usize {
        let slot = match self.in_flight.lock().get(key) {
            Some(slot) => Arc::clone(slot),
            None => return 0,
        };
        let flight = slot.flight.lock();
        match &*flight {
            Flight::Running { waiters } => *waiters,
            _ => 0,
        }
    }

    /// Keys with a computation running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
