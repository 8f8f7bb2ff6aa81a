//! Fuzz coverage for everything that parses untrusted input.
//!
//! Each fuzzed function must return `Ok` or `Err` without panicking, no
//! matter the input: empty strings, megabyte-long strings, multi-byte
//! UTF-8, control characters, or JWT-shaped garbage.
//!
//! Runs under cargo-fuzz on a nightly toolchain:
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```
//!
//! Covered surfaces: the request field rules (`validate_username`,
//! `validate_password`, `validate_full_name`, `validate_email`),
//! correlation id acceptance (`is_canonical_request_id`), and compact
//! JWT parsing (`TokenCodec::verify`).

#![no_main]

use std::sync::OnceLock;

use bitacora_auth::TokenCodec;
use bitacora_auth::middleware::is_canonical_request_id;
use bitacora_auth::validation::{
    validate_email, validate_full_name, validate_password, validate_username,
};
use libfuzzer_sys::fuzz_target;

fn codec() -> &'static TokenCodec {
    static CODEC: OnceLock<TokenCodec> = OnceLock::new();
    CODEC.get_or_init(|| TokenCodec::new("fuzzing-secret-0123456789abcdef", 3600))
}

fuzz_target!(|data: &[u8]| {
    // Every fuzzed surface takes &str; non-UTF-8 inputs exercise nothing
    if let Ok(s) = std::str::from_utf8(data) {
        // Credential fields
        let _ = validate_username(s);
        let _ = validate_password(s);

        // Guest provisioning fields
        let _ = validate_full_name(s);
        let _ = validate_email(s);

        // Correlation id acceptance
        let _ = is_canonical_request_id(s);

        // Compact JWT parsing
        let _ = codec().verify(s);
    }
});
