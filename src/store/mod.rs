//! Record store interface
//!
//! The engine owns entity shapes; a store is opaque key/value persistence of
//! whole collections. Entities travel as `serde_json::Value` so any backend
//! can hold them without knowing their schema.
//!
//! ```rust,ignore
//! let store = MemoryStore::new();
//! save_all(&store, &offers)?;
//! let loaded: Vec<LendingOffer> = load_all(&store)?;
//! ```

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::{EntityKind, LendingError, LendingResult};

/// Named collections the engine persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Offers,
    Requests,
    Contracts,
    Disputes,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Offers,
        Collection::Requests,
        Collection::Contracts,
        Collection::Disputes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Offers => "offers",
            Collection::Requests => "requests",
            Collection::Contracts => "contracts",
            Collection::Disputes => "disputes",
        }
    }

    /// Entity kind stored in this collection
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Collection::Offers => EntityKind::Offer,
            Collection::Requests => EntityKind::Request,
            Collection::Contracts => EntityKind::Contract,
            Collection::Disputes => EntityKind::Dispute,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value persistence of whole collections
///
/// Implement this trait to plug in a backend. A store offers no transactions;
/// the engine serialises its own read-modify-write cycles.
pub trait RecordStore: Send + Sync {
    /// Load every record of a collection (empty when never saved)
    fn load(&self, collection: Collection) -> LendingResult<Vec<Value>>;

    /// Replace a collection's contents
    fn save(&self, collection: Collection, records: Vec<Value>) -> LendingResult<()>;
}

/// An entity persisted in a collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Deserialize raw collection values
pub fn decode_all<T: Record>(values: Vec<Value>) -> LendingResult<Vec<T>> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(LendingError::from))
        .collect()
}

/// Serialize records into raw collection values
pub fn encode_all<T: Record>(records: &[T]) -> LendingResult<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(LendingError::from))
        .collect()
}

/// Load and deserialize a whole collection
pub fn load_all<T: Record, S: RecordStore + ?Sized>(store: &S) -> LendingResult<Vec<T>> {
    decode_all(store.load(T::COLLECTION)?)
}

/// Serialize and replace a whole collection
pub fn save_all<T: Record, S: RecordStore + ?Sized>(store: &S, records: &[T]) -> LendingResult<()> {
    store.save(T::COLLECTION, encode_all(records)?)
}

/// Find a record by id in a loaded collection
pub fn find<'a, T: Record>(records: &'a [T], id: &str) -> LendingResult<&'a T> {
    records
        .iter()
        .find(|r| r.id() == id)
        .ok_or_else(|| LendingError::not_found(T::COLLECTION.entity_kind(), id))
}

/// Mutable variant of [`find`]
pub fn find_mut<'a, T: Record>(records: &'a mut [T], id: &str) -> LendingResult<&'a mut T> {
    records
        .iter_mut()
        .find(|r| r.id() == id)
        .ok_or_else(|| LendingError::not_found(T::COLLECTION.entity_kind(), id))
}
