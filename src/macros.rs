//! Internal helper macros for synchronisation primitives.
//!
//! The patching engine is single threaded while rewriting, but the runtime side (host
//! objects, caches) is touched from arbitrary host threads.

/// Acquires a `Mutex` guard, panicking if the mutex is poisoned.
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().expect("Failed to acquire lock")
    };
}
