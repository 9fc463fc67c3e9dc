//! Memoised command bindings

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::trace;

use super::command::BoundCommand;
use super::schema::CommandSchema;
use super::{Error, Result};

/// Key of one binding: schema, id offset and negotiated compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingKey {
    /// Schema being bound
    pub schema: CommandSchema,
    /// Id offset of the owning protocol
    pub id_offset: u64,
    /// Negotiated snappy support
    pub snappy_support: bool,
}

/// Cache of [`BoundCommand`]s keyed by [`BindingKey`].
///
/// Lookups and inserts happen under one lock, so concurrent first use of a
/// key yields a single shared instance. Entries are never evicted
/// implicitly; long-lived processes can call [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct CommandCache {
    bindings: Mutex<HashMap<BindingKey, Arc<BoundCommand>>>,
}

static GLOBAL: OnceLock<Arc<CommandCache>> = OnceLock::new();

impl CommandCache {
    /// Create an empty, isolated cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by protocols that were not given their own.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Return the bound command for the triple, creating it on first use.
    ///
    /// Fails when `id_offset + schema.base_id` does not fit in a `u64`.
    pub fn bind(
        &self,
        schema: CommandSchema,
        id_offset: u64,
        snappy_support: bool,
    ) -> Result<Arc<BoundCommand>> {
        if id_offset.checked_add(schema.base_id).is_none() {
            return Err(Error::IdOverflow {
                name: schema.name,
                offset: id_offset,
                length: schema.base_id.saturating_add(1),
            });
        }
        Ok(self.bind_in_range(schema, id_offset, snappy_support))
    }

    // Callers have checked that the final id fits.
    pub(crate) fn bind_in_range(
        &self,
        schema: CommandSchema,
        id_offset: u64,
        snappy_support: bool,
    ) -> Arc<BoundCommand> {
        let key = BindingKey {
            schema,
            id_offset,
            snappy_support,
        };
        let mut bindings = self.bindings.lock();
        Arc::clone(bindings.entry(key).or_insert_with(|| {
            trace!(
                command = schema.name,
                id_offset,
                snappy_support,
                "binding command"
            );
            Arc::new(BoundCommand::new(schema, id_offset, snappy_support))
        }))
    }

    /// Number of cached bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Whether the cache holds no bindings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }

    /// Drop every cached binding. Commands already handed out stay valid.
    pub fn clear(&self) {
        self.bindings.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Sedes;
    use std::thread;

    const BLOCK_HEADERS: CommandSchema =
        CommandSchema::items("BlockHeaders", 4, Sedes::CountableList(&Sedes::Binary));

    #[test]
    fn test_identical_triples_share_instance() {
        let cache = CommandCache::new();
        let first = cache.bind(BLOCK_HEADERS, 16, false).unwrap();
        let second = cache.bind(BLOCK_HEADERS, 16, false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_triples_distinct_instances() {
        let cache = CommandCache::new();
        let plain = cache.bind(BLOCK_HEADERS, 16, false).unwrap();
        let snappy = cache.bind(BLOCK_HEADERS, 16, true).unwrap();
        let moved = cache.bind(BLOCK_HEADERS, 32, false).unwrap();
        assert!(!Arc::ptr_eq(&plain, &snappy));
        assert_eq!(plain.cmd_id(), 20);
        assert_eq!(moved.cmd_id(), 36);
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(plain.cmd_id(), 20);
    }

    #[test]
    fn test_concurrent_first_use_yields_one_instance() {
        let cache = Arc::new(CommandCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.bind(BLOCK_HEADERS, 48, true).unwrap())
            })
            .collect();
        let bound: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(bound.iter().all(|cmd| Arc::ptr_eq(cmd, &bound[0])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let cache = CommandCache::new();
        let err = cache.bind(BLOCK_HEADERS, u64::MAX - 3, false).unwrap_err();
        assert!(matches!(
            err,
            Error::IdOverflow {
                name: "BlockHeaders",
                length: 5,
                ..
            }
        ));
        assert!(cache.is_empty());

        let last = cache.bind(BLOCK_HEADERS, u64::MAX - 4, false).unwrap();
        assert_eq!(last.cmd_id(), u64::MAX);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&CommandCache::global(), &CommandCache::global()));
    }
}
