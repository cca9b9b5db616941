pub mod resolver;

pub use resolver::{VersionInfo, VersionResolver};
