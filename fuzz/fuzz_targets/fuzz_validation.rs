//! Fuzz target for `/wan/update` address validation.
//!
//! Checks that validation never panics and that every accepted list is safe
//! to hand to the endpoint script as discrete arguments.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use mptcpkit_api::validation::{MAX_ADDRESSES, MAX_ADDRESS_LENGTH, validate_address_list};

fuzz_target!(|ips: Vec<String>| {
    if validate_address_list(&ips).is_ok() {
        assert!(!ips.is_empty() && ips.len() <= MAX_ADDRESSES);
        for ip in &ips {
            assert!(!ip.is_empty() && ip.len() <= MAX_ADDRESS_LENGTH);
            assert!(!ip.starts_with('-'));
            assert!(!ip.chars().any(|c| c.is_whitespace() || "$`'\";|&<>()*?\\".contains(c)));
        }
    }
});
