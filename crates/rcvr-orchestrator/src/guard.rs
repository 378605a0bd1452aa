//! ---
//! rcvr_section: "02-orchestration"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Scoped in-flight markers for recovery procedures."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::collections::HashSet;

use parking_lot::Mutex;

/// Marks a procedure as in flight for as long as the guard lives.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    procedure_id: String,
}

impl<'a> InFlightGuard<'a> {
    /// Check-and-insert under a single lock acquisition. `None` when the
    /// procedure is already in flight.
    pub(crate) fn acquire(set: &'a Mutex<HashSet<String>>, procedure_id: &str) -> Option<Self> {
        if !set.lock().insert(procedure_id.to_string()) {
            return None;
        }
        Some(Self {
            set,
            procedure_id: procedure_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.procedure_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let set = Mutex::new(HashSet::new());
        let guard = InFlightGuard::acquire(&set, "website_recovery").unwrap();
        assert!(InFlightGuard::acquire(&set, "website_recovery").is_none());
        assert!(InFlightGuard::acquire(&set, "data_recovery").is_some());
        drop(guard);
        assert!(InFlightGuard::acquire(&set, "website_recovery").is_some());
        assert!(set.lock().is_empty());
    }

    #[test]
    fn guard_releases_during_unwind() {
        let set = Mutex::new(HashSet::new());
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = InFlightGuard::acquire(&set, "scan").unwrap();
            panic!("executor blew up");
        }));
        assert!(outcome.is_err());
        assert!(set.lock().is_empty());
    }
}
