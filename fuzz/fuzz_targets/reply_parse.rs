#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let stdout = String::from_utf8_lossy(data);
    let _ = canister_research::probe::dfx::parse_text_reply(&stdout);
    let _ = canister_research::probe::dfx::parse_principal_reply(&stdout);
});
