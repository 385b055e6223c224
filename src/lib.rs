//! synckit: concurrency primitives and cache data structures for embedding in
//! serving systems (rate limiters, worker pools, shared caches).
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod atomic;
pub mod cache;
pub mod error;
pub mod limit;
pub mod prelude;
pub mod queue;
pub mod traits;
