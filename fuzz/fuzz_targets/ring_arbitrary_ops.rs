#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use synckit::queue::RingBuffer;

// Fuzz push/pop sequences on RingBuffer against a VecDeque model
//
// Single-threaded, so the ring must agree with the model exactly: same
// accept/reject decisions, same FIFO order, same occupancy.
fuzz_target!(|data: &[u8]| {
    let ring: RingBuffer<u8, 16> = RingBuffer::new();
    let mut model: VecDeque<u8> = VecDeque::new();

    for (step, &byte) in data.iter().enumerate() {
        if byte % 2 == 0 {
            let value = step as u8;
            let accepted = ring.try_push(value).is_ok();
            if model.len() < 16 {
                assert!(accepted);
                model.push_back(value);
            } else {
                assert!(!accepted);
            }
        } else {
            assert_eq!(ring.try_pop(), model.pop_front());
        }

        assert_eq!(ring.len(), model.len());
        assert_eq!(ring.is_empty(), model.is_empty());
    }

    // drain and compare the tails
    while let Some(expected) = model.pop_front() {
        assert_eq!(ring.try_pop(), Some(expected));
    }
    assert_eq!(ring.try_pop(), None);
});
