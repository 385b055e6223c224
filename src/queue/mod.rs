mod epoch;
pub mod linked;
pub mod ring;

pub use linked::LinkedQueue;
pub use ring::RingBuffer;
