use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::descriptor::{Entity, EntityDescriptor};
use crate::error::TideError;

type Cell = Arc<OnceCell<Arc<EntityDescriptor>>>;

/// Descriptor cache: one descriptor per entity type, built on first request.
///
/// Concurrent first requests for the same type block on the same cell, so
/// the type's bindings run exactly once. A failed build is not cached and
/// fails again on the next request.
#[derive(Default)]
pub struct Registry {
    cells: Mutex<HashMap<TypeId, Cell>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for `E`, building and caching it if needed.
    ///
    /// # Errors
    ///
    /// `TideError::Configuration` when the bindings of `E` are invalid.
    pub fn resolve<E: Entity>(&self) -> Result<Arc<EntityDescriptor>, TideError> {
        let cell = self.cell_for(TypeId::of::<E>());
        cell.get_or_try_init(|| {
            let descriptor = EntityDescriptor::build::<E>()?;
            log::debug!(
                "built descriptor for {} (table {}, {} columns, {} relations)",
                descriptor.type_name(),
                descriptor.table(),
                descriptor.columns().len(),
                descriptor.relations().len()
            );
            Ok(Arc::new(descriptor))
        })
        .map(Arc::clone)
    }

    fn cell_for(&self, type_id: TypeId) -> Cell {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cells.entry(type_id).or_default())
    }

    /// Whether a descriptor for `E` has been built
    pub fn contains<E: Entity>(&self) -> bool {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells
            .get(&TypeId::of::<E>())
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Number of built descriptors
    pub fn len(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("descriptors", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_cfg::entities::{Customer, Order, Untabled, Widget, WIDGET_BUILDS};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_resolve_caches_descriptor() {
        let registry = Registry::new();
        let first = registry.resolve::<Order>().unwrap();
        let second = registry.resolve::<Order>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.contains::<Order>());
        assert!(!registry.contains::<Customer>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let registry = Registry::new();
        assert!(registry.resolve::<Untabled>().unwrap_err().is_configuration());
        assert!(registry.resolve::<Untabled>().unwrap_err().is_configuration());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_first_requests_build_once() {
        let registry = Registry::new();
        let before = WIDGET_BUILDS.load(Ordering::SeqCst);

        let descriptors: Vec<Arc<EntityDescriptor>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.resolve::<Widget>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(WIDGET_BUILDS.load(Ordering::SeqCst) - before, 1);
        assert!(descriptors.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
