#![no_main]

use libfuzzer_sys::fuzz_target;
use synckit::cache::LfuCache;

// Fuzz arbitrary operation sequences on LfuCache
//
// Tests random sequences of put, get, get_copy, get_locked, contains, and
// frequency lookups to find edge cases and invariant violations.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = (data[0] as usize) % 33;
    let cache: LfuCache<u8, u32> = LfuCache::new(capacity);

    let mut idx = 1;
    while idx + 1 < data.len() {
        let op = data[idx] % 6;
        let key = data[idx + 1] % 64;

        match op {
            0 => {
                cache.put(key, key as u32);
            }
            1 => {
                let _ = cache.get(&key);
            }
            2 => {
                let _ = cache.get_copy(&key);
            }
            3 => {
                if let Some(entry) = cache.get_locked(&key) {
                    let _ = *entry;
                }
            }
            4 => {
                let _ = cache.contains(&key);
            }
            5 => {
                let _ = cache.frequency(&key);
            }
            _ => unreachable!(),
        }

        assert!(cache.len() <= capacity);
        cache.debug_validate_invariants();

        idx += 2;
    }
});
