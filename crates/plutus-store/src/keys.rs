//! Key encoding utilities for `RocksDB`.
//!
//! Integers are written big-endian so byte order matches numeric order.
//! Timestamps get their sign bit flipped for the same reason.

use chrono::{DateTime, Utc};
use plutus_core::{SessionId, UserId};

/// Encode a storage row id.
#[must_use]
pub fn id_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode a storage row id from the last 8 bytes of `key`.
#[must_use]
pub fn trailing_id(key: &[u8]) -> Option<i64> {
    let start = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[start..].try_into().ok()?;
    Some(i64::from_be_bytes(bytes))
}

fn ordered_millis(at: DateTime<Utc>) -> [u8; 8] {
    // Flip the sign bit so negative instants sort first.
    (at.timestamp_millis() ^ i64::MIN).to_be_bytes()
}

/// Create a FIFO index key for a ledger entry.
///
/// Format: `user_id (16) || expires_at millis (8) || ledger_id (8)`
#[must_use]
pub fn ledger_by_user_key(user_id: &UserId, expires_at: DateTime<Utc>, ledger_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&ordered_millis(expires_at));
    key.extend_from_slice(&id_key(ledger_id));
    key
}

/// Create a key from a user id; also the prefix of every per-user index.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a freeze key from a session id.
#[must_use]
pub fn freeze_key(session_id: &SessionId) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}

/// Create a user-freeze index key.
///
/// Format: `user_id (16) || session_id (16)`
#[must_use]
pub fn freeze_by_user_key(user_id: &UserId, session_id: &SessionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(session_id.as_bytes());
    key
}

/// Extract the session id from a user-freeze index key.
#[must_use]
pub fn session_from_freeze_key(key: &[u8]) -> Option<SessionId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    Some(SessionId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Create a user-record index key.
///
/// Format: `user_id (16) || record_id (8)`
#[must_use]
pub fn record_by_user_key(user_id: &UserId, record_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&id_key(record_id));
    key
}

/// Prefix of every key under a terminated string component.
#[must_use]
pub fn string_prefix(value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + 1);
    key.extend_from_slice(value.as_bytes());
    key.push(0);
    key
}

/// Create a source-record index key.
///
/// Format: `source_id || 0x00 || record_id (8)`
#[must_use]
pub fn record_by_source_key(source_id: &str, record_id: i64) -> Vec<u8> {
    let mut key = string_prefix(source_id);
    key.extend_from_slice(&id_key(record_id));
    key
}

/// Create a consumption detail key.
///
/// Format: `transaction_id || 0x00 || ledger_id (8)`
#[must_use]
pub fn consumption_detail_key(transaction_id: &str, ledger_id: i64) -> Vec<u8> {
    let mut key = string_prefix(transaction_id);
    key.extend_from_slice(&id_key(ledger_id));
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ledger_index_sorts_by_expiry_then_id() {
        let user_id = UserId::generate();
        let now = Utc::now();
        let early = ledger_by_user_key(&user_id, now, 9);
        let late = ledger_by_user_key(&user_id, now + Duration::days(1), 1);
        let tie = ledger_by_user_key(&user_id, now, 10);
        assert!(early < late);
        assert!(early < tie);
        assert!(early.starts_with(&user_key(&user_id)));
    }

    #[test]
    fn pre_epoch_instants_sort_first() {
        let user_id = UserId::generate();
        let before = DateTime::<Utc>::from_timestamp(-1000, 0).unwrap();
        let after = DateTime::<Utc>::from_timestamp(1000, 0).unwrap();
        assert!(ledger_by_user_key(&user_id, before, 1) < ledger_by_user_key(&user_id, after, 1));
    }

    #[test]
    fn trailing_id_roundtrip() {
        let key = record_by_source_key("session-1", 42);
        assert_eq!(trailing_id(&key), Some(42));
        assert_eq!(trailing_id(&[1, 2]), None);
    }

    #[test]
    fn source_prefix_does_not_match_longer_ids() {
        let key = record_by_source_key("ab", 1);
        assert!(!key.starts_with(&string_prefix("a")));
        assert!(key.starts_with(&string_prefix("ab")));
    }

    #[test]
    fn session_extracted_from_freeze_index() {
        let user_id = UserId::generate();
        let session_id = SessionId::generate();
        let key = freeze_by_user_key(&user_id, &session_id);
        assert_eq!(session_from_freeze_key(&key), Some(session_id));
    }
}
