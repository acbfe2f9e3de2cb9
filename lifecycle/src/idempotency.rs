//! Request fingerprints for idempotent ticket creation

use serde::Serialize;

use crate::error::{TicketError, TicketResult};
use crate::store::IdempotencyRecord;

/// Longest accepted `Idempotency-Key`
pub const MAX_KEY_LEN: usize = 128;

/// blake3 hex digest of the caller plus the serialized request.
pub fn fingerprint<T: Serialize>(caller: &str, request: &T) -> TicketResult<String> {
    let body = serde_json::to_vec(request)
        .map_err(|e| TicketError::invalid(format!("unserializable request: {}", e)))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(caller.as_bytes());
    hasher.update(&[0]);
    hasher.update(&body);
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn validate_key(key: &str) -> TicketResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(TicketError::invalid(format!(
            "idempotency key must be 1..={} bytes",
            MAX_KEY_LEN
        )));
    }
    if !key.chars().all(|c| c.is_ascii_graphic()) {
        return Err(TicketError::invalid(
            "idempotency key must be printable ASCII",
        ));
    }
    Ok(())
}

/// Outcome of checking a key against what is already stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replay {
    /// Key unseen; proceed with the request
    Fresh,
    /// Same key and same request; return the original ticket
    Existing(String),
}

pub fn check(existing: Option<&IdempotencyRecord>, fingerprint: &str) -> TicketResult<Replay> {
    match existing {
        None => Ok(Replay::Fresh),
        Some(record) if record.fingerprint == fingerprint => {
            Ok(Replay::Existing(record.ticket_id.clone()))
        }
        Some(record) => Err(TicketError::invalid(format!(
            "idempotency key '{}' was already used for a different request",
            record.key
        ))),
    }
}
