#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(list) = canister_research::core::parse_candidates(text) {
            let mut seen = std::collections::HashSet::new();
            assert!(list.iter().all(|c| seen.insert(c.id.clone())));
        }
    }
});
