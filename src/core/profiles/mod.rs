pub mod lock;
pub mod model;
pub mod repository;

pub use model::{Profile, ProfileDatabase, ProfileSet, EXPECTED_SCHEMA_VERSION, PROFILES_FILE};
pub use repository::{ProfileRepository, Readiness};
