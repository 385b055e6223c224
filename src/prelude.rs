pub use crate::atomic::{AtomicScalar, BoundCounter, Clamp, MinMax};
pub use crate::cache::{LfuCache, LockedEntry};
pub use crate::error::Full;
pub use crate::limit::{TokenBucket, WindowLimiter};
pub use crate::queue::{LinkedQueue, RingBuffer};
pub use crate::traits::ConcurrentQueue;
