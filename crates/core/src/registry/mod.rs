//! Run registry: resolves opaque run ids to fetchable file metadata.

mod http;
mod types;

pub use http::HttpRunRegistry;
pub use types::{RegistryConfig, RegistryError, RunDescriptor, RunRegistry};
