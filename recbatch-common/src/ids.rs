//! Prefixed opaque identifiers
//!
//! Every entity id carries a short type prefix over a UUIDv4 hex payload:
//! `rb_` batches, `upl_` upload slots, `rec_` recordings, `tok_` tokens.
//! The prefix is cosmetic (ids are compared as whole strings); it makes
//! logs and API payloads self-describing.

use uuid::Uuid;

/// Mint a new id with the given prefix
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// New batch id (`rb_...`)
pub fn new_batch_id() -> String {
    new_id("rb")
}

/// New upload slot id (`upl_...`)
pub fn new_upload_id() -> String {
    new_id("upl")
}

/// New recording id (`rec_...`)
pub fn new_recording_id() -> String {
    new_id("rec")
}

/// New single-use upload token (`tok_...`)
pub fn new_token() -> String {
    new_id("tok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix() {
        assert!(new_batch_id().starts_with("rb_"));
        assert!(new_upload_id().starts_with("upl_"));
        assert!(new_recording_id().starts_with("rec_"));
        assert!(new_token().starts_with("tok_"));
    }

    #[test]
    fn ids_are_unique() {
        let a = new_batch_id();
        let b = new_batch_id();
        assert_ne!(a, b);
    }

    #[test]
    fn id_payload_is_hex() {
        let id = new_id("x");
        let payload = id.strip_prefix("x_").unwrap();
        assert_eq!(payload.len(), 32);
        assert!(payload.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
