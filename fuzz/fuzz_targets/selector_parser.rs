#![no_main]

use libfuzzer_sys::fuzz_target;
use patchweave::Selector;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing must not panic; accepted selectors must round-trip
        if let Ok(selector) = Selector::parse(input) {
            let reparsed = Selector::parse(selector.as_str()).expect("parsed selector reparses");
            assert_eq!(selector, reparsed);
        }
    }
});
