//! Test registry
//!
//! Append-only store of descriptors for the current run cycle. Registration
//! works through a shared reference so loading tasks can register while the
//! startup heuristic polls [`Registry::len`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::models::{Descriptor, TestKind};

/// Listing entry for a registered test
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub index: usize,
    pub name: String,
    pub kind: TestKind,
}

#[derive(Default)]
pub struct Registry {
    pending: Mutex<Vec<Descriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Vec<Descriptor>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a descriptor, assigning its sequence index
    pub fn register(&self, mut descriptor: Descriptor) -> usize {
        let mut pending = self.pending();
        descriptor.index = pending.len();
        let index = descriptor.index;
        pending.push(descriptor);
        index
    }

    /// Take every pending descriptor in registration order.
    ///
    /// The registry is empty afterwards and the next registration starts a
    /// fresh cycle at index 0.
    pub fn drain(&self) -> Vec<Descriptor> {
        std::mem::take(&mut *self.pending())
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<Listing> {
        self.pending()
            .iter()
            .map(|d| Listing {
                index: d.index,
                name: d.name.clone(),
                kind: d.kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{body, TestOptions};

    fn descriptor(name: &str, kind: TestKind) -> Descriptor {
        Descriptor::new(
            name,
            kind,
            TestOptions::new(),
            Some(body(|_, _| async { Ok(()) })),
        )
    }

    #[test]
    fn test_register_preserves_order() {
        let registry = Registry::new();
        assert_eq!(registry.register(descriptor("a", TestKind::Normal)), 0);
        assert_eq!(registry.register(descriptor("b", TestKind::Only)), 1);
        assert_eq!(registry.register(descriptor("c", TestKind::Fork)), 2);

        let names: Vec<_> = registry.list().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_drain_starts_fresh_cycle() {
        let registry = Registry::new();
        registry.register(descriptor("a", TestKind::Normal));
        registry.register(descriptor("b", TestKind::Normal));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].index, 1);
        assert!(registry.is_empty());

        assert_eq!(registry.register(descriptor("c", TestKind::Normal)), 0);
        assert_eq!(registry.drain()[0].name, "c");
    }
}
