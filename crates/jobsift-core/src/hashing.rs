//! Deterministic fingerprints for posting identity and content.

use sha2::{Digest, Sha256};

/// Stable identity key for a posting.
///
/// SHA-256 over `source | external_id`, both lower-cased and trimmed so
/// incidental formatting differences upstream never split one posting into
/// two. Hex-encoded.
#[must_use]
pub fn identity_hash(source: &str, external_id: &str) -> String {
    let input = format!(
        "{}|{}",
        source.trim().to_lowercase(),
        external_id.trim().to_lowercase()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Fingerprint of a posting's judged-relevant content.
///
/// SHA-256 over `title | company | full_text`. Any change in these fields
/// changes the hash; a byte-identical re-fetch does not. Hex-encoded.
#[must_use]
pub fn content_hash(title: &str, company: &str, full_text: &str) -> String {
    let input = format!("{title}|{company}|{full_text}");
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_deterministic() {
        assert_eq!(identity_hash("dou", "123"), identity_hash("dou", "123"));
    }

    #[test]
    fn identity_ignores_case_and_whitespace() {
        assert_eq!(identity_hash("dou", "abc"), identity_hash(" DOU ", "ABC "));
    }

    #[test]
    fn identity_differs_across_sources() {
        assert_ne!(identity_hash("dou", "123"), identity_hash("djinni", "123"));
    }

    #[test]
    fn identity_is_hex_sha256() {
        let hash = identity_hash("dou", "123");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_changes_with_any_field() {
        let base = content_hash("Backend Dev", "Acme", "text");
        assert_ne!(base, content_hash("Backend Dev!", "Acme", "text"));
        assert_ne!(base, content_hash("Backend Dev", "Acme Inc", "text"));
        assert_ne!(base, content_hash("Backend Dev", "Acme", "text v2"));
        assert_eq!(base, content_hash("Backend Dev", "Acme", "text"));
    }
}
