//! Run file acquisition: streaming download plus checksum verification.

mod fetcher;
mod http;
mod types;

pub use fetcher::{FetchPolicy, VerifiedFetcher};
pub use http::HttpRunFileStore;
pub use types::{FetchError, FetchReport, RunFileStore, TransferError};
