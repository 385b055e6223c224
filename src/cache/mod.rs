pub mod lfu;

pub use lfu::{LfuCache, LockedEntry};
