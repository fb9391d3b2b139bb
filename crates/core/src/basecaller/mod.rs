//! Basecaller sessions: submit raw reads, collect called sequences.

mod tcp;
mod types;

pub use tcp::TcpBasecaller;
pub use types::{BasecallSession, Basecaller, BasecallerConfig, CalledRead, SessionError};
