pub mod db;
pub mod memory;
pub mod models;
pub mod repos;
pub mod store;

pub use memory::MemoryStore;
pub use store::{PgStore, StoreError, StoreResult, TournamentStore};
