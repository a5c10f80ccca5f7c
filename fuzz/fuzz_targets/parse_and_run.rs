#![no_main]

use libfuzzer_sys::fuzz_target;
use miniasm::{run_source, Limits};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // Bounded so looping programs still terminate.
        let limits = Limits {
            max_steps: Some(10_000),
            ..Limits::strict()
        };
        let _ = run_source(source, &limits);
    }
});
