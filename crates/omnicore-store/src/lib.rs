pub mod error;
mod memory;
mod sqlite_store;
mod store;
pub mod watch;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use sqlite_store::SqliteStore;
pub use store::{ListFilter, ResourceStore};
pub use watch::{join, Event, EventKind, Hub, WatchRequest};
