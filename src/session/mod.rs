//! Per-client chunk accumulation
//!
//! Uploads land in a `ChunkStore` keyed by client id. A finalize takes the
//! whole `ClientSession` out of the store in one step.

mod session;
mod stats;
mod store;

pub use session::{Chunk, ClientSession};
pub use stats::SessionSummary;
pub use store::{AppendAck, ChunkStore};
