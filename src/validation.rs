use crate::error::{AppError, AppResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum number of addresses in one `/wan/update` request.
pub const MAX_ADDRESSES: usize = 64;

/// Maximum length of a single address entry (DNS name limit).
pub const MAX_ADDRESS_LENGTH: usize = 253;

/// Punctuation allowed in an address besides ASCII alphanumerics.
///
/// Covers dotted IPv4, IPv6 (including `[..]` and `%zone`), CIDR prefixes and
/// host names.
const ADDRESS_PUNCTUATION: &[char] = &['.', ':', '/', '_', '-', '%', '[', ']'];

/// Validate the address list submitted to `/wan/update`.
///
/// Rules:
/// - The list must hold between 1 and [`MAX_ADDRESSES`] entries
/// - Every entry must satisfy [`validate_address`]
pub fn validate_address_list(addresses: &[String]) -> AppResult<()> {
    if addresses.is_empty() {
        return Err(AppError::BadRequest("ips cannot be empty".to_string()));
    }

    if addresses.len() > MAX_ADDRESSES {
        return Err(AppError::BadRequest(format!(
            "ips cannot hold more than {MAX_ADDRESSES} entries (got {})",
            addresses.len()
        )));
    }

    for (index, address) in addresses.iter().enumerate() {
        validate_address(address)
            .map_err(|e| AppError::BadRequest(format!("ips[{index}]: {e}")))?;
    }

    Ok(())
}

/// Validate a single address entry.
///
/// Rules:
/// - Must be between 1 and 253 characters
/// - Must not start with `-` (scripts would read it as an option)
/// - Only ASCII alphanumerics and `. : / _ - % [ ]`
///
/// Entries are passed to the script as discrete arguments; these rules keep
/// them free of whitespace, quotes and shell metacharacters as well.
pub fn validate_address(address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("address cannot be empty".to_string());
    }

    if address.len() > MAX_ADDRESS_LENGTH {
        return Err(format!(
            "address cannot exceed {MAX_ADDRESS_LENGTH} characters"
        ));
    }

    if address.starts_with('-') {
        return Err("address cannot start with '-'".to_string());
    }

    if let Some((pos, c)) = address
        .chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_alphanumeric() && !ADDRESS_PUNCTUATION.contains(c))
    {
        return Err(format!(
            "address contains invalid character {c:?} at position {pos}"
        ));
    }

    Ok(())
}
