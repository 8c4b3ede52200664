use crate::error::{EngineError, EngineResult};

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Shared context store: one instance per type, created on first request.
///
/// This container is engine-thread local. It allows !Send / !Sync values
/// (e.g. native window handles), because many platform handles are thread-affine.
///
/// The store is the only place instances are created, which is what keeps
/// every type a singleton. There is no `insert`: callers mutate the
/// default-constructed block in place.
#[derive(Default)]
pub struct Resources {
    typed: HashMap<TypeId, Box<dyn Any>>,
}

impl Resources {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the block for `T`, default-initializing it on first access.
    pub fn get_or_create<T>(&mut self) -> &mut T
    where
        T: Any + Default,
    {
        let slot = self
            .typed
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));

        match slot.downcast_mut::<T>() {
            Some(v) => v,
            None => unreachable!("resource slot keyed by TypeId holds a different type"),
        }
    }

    /// Absence is an expected condition: callers skip their work for this tick.
    #[inline]
    pub fn try_get<T>(&self) -> Option<&T>
    where
        T: Any,
    {
        self.typed
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    #[inline]
    pub fn try_get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Any,
    {
        self.typed
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Like [`Self::try_get`], for callers that propagate absence as an error.
    #[inline]
    pub fn require<T>(&self) -> EngineResult<&T>
    where
        T: Any,
    {
        self.try_get::<T>().ok_or_else(EngineError::absent::<T>)
    }

    #[inline]
    pub fn contains<T>(&self) -> bool
    where
        T: Any,
    {
        self.typed.contains_key(&TypeId::of::<T>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.typed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.typed.is_empty()
    }

    /// World teardown: drops every block at once.
    pub fn clear(&mut self) {
        log::debug!("resources: dropping {} context blocks", self.typed.len());
        self.typed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Counter {
        value: u32,
    }

    #[derive(Default)]
    struct Other(#[allow(dead_code)] u8);

    #[test]
    fn get_or_create_returns_same_instance() {
        let mut r = Resources::new();

        let first: *const Counter = r.get_or_create::<Counter>();
        r.get_or_create::<Counter>().value = 7;
        let second: *const Counter = r.get_or_create::<Counter>();

        assert!(std::ptr::eq(first, second));
        assert_eq!(r.try_get::<Counter>(), Some(&Counter { value: 7 }));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn first_access_is_default_initialized() {
        let mut r = Resources::new();
        assert_eq!(r.get_or_create::<Counter>().value, 0);
    }

    #[test]
    fn absence_is_reported_not_created() {
        let mut r = Resources::new();
        assert!(r.try_get::<Counter>().is_none());
        assert!(r.try_get_mut::<Counter>().is_none());
        assert!(!r.contains::<Counter>());
        assert!(matches!(r.require::<Counter>(), Err(EngineError::Absent { .. })));
        assert!(r.is_empty());
    }

    #[test]
    fn types_are_isolated_and_cleared_together() {
        let mut r = Resources::new();
        r.get_or_create::<Counter>().value = 1;
        r.get_or_create::<Other>();
        assert_eq!(r.len(), 2);

        r.clear();
        assert!(r.try_get::<Counter>().is_none());
        assert!(r.try_get::<Other>().is_none());
    }
}
