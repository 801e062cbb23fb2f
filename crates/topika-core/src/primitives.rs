//! # Engine Constants
//!
//! Hardcoded runtime constants for the Topika engine.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Magic bytes for the Topika binary format header.
///
/// - File Header = Magic Bytes ("TMAP") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"TMAP";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed payload size for the persistence format.
///
/// Validated BEFORE attempting deserialization to prevent allocation-based
/// memory exhaustion from corrupted or malicious snapshot files.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Maximum length for a locator reference string.
///
/// Locators longer than this are rejected at assignment time.
pub const MAX_LOCATOR_LENGTH: usize = 4096;

/// Maximum length for a name, occurrence, or variant value.
///
/// Values longer than this (64KB) are rejected at creation time.
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Default datatype locator for string-valued occurrences and variants.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"TMAP");
    }

    #[test]
    fn payload_limit_is_500_mb() {
        assert_eq!(MAX_PERSISTENCE_PAYLOAD_SIZE, 500 * 1024 * 1024);
    }
}
