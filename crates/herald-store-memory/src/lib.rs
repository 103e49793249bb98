//! In-memory backend for the Herald report store.
//!
//! Reports live only as long as the process does. A single
//! [`tokio::sync::RwLock`] serialises every write, which is what makes
//! `put`'s uniqueness check and `mutate`'s read-modify-write atomic.

mod store;

pub use store::MemoryStore;
