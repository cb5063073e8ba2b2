pub mod diff;
pub mod error;
pub mod id_matching;
pub mod mapping;
pub mod pairing;
pub mod precedence;
pub mod provenance;
pub mod resolution;
pub mod sync;
pub mod viewed_cache;
pub mod viewed_cache_storage;

pub use diff::{cleanup, push_actions};
pub use error::EngineError;
pub use id_matching::{same_identity, IdentityIndex};
pub use mapping::NameMapping;
pub use precedence::{precedence, Precedence};
pub use resolution::sync_actions;
pub use sync::{SyncOrchestrator, SyncResult};
pub use viewed_cache::{CacheEntry, ViewedDateCache};
pub use viewed_cache_storage::ViewedDateStorage;
