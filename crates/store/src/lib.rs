pub mod db;
pub mod error;
pub mod memory;
pub mod pg;
pub mod traits;

pub use db::init_pg_pool;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use traits::{
    EventSource, HeartbeatStore, HistoryStore, JobStore, ProfileStore, ResultCounts, ResultStore,
    Store, StoreEvent, UpsertOutcome,
};
