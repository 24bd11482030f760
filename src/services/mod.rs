// Service exports
pub mod assignment;
pub mod cache;
pub mod directory;
pub mod memory;
pub mod postgres;
pub mod store;

pub use assignment::{AssignmentService, DEFAULT_PERSON_LIMIT};
pub use cache::{CacheError, CacheKey, CacheStats, DirectoryCache};
pub use directory::ShelterDirectory;
pub use memory::InMemoryOccupancyStore;
pub use postgres::{PgOccupancyStore, StatusColumn};
pub use store::OccupancyStore;
