pub mod bound_counter;
pub mod clamp;
pub mod min_max;
pub mod scalar;

pub use bound_counter::BoundCounter;
pub use clamp::Clamp;
pub use min_max::MinMax;
pub use scalar::AtomicScalar;
