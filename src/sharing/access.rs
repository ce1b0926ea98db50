//! Download gate: expiry first, then password.

use chrono::{DateTime, Utc};

use crate::storage::models::FileRecord;

/// Outcome of checking whether a shared file may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Expired,
    PasswordRequired,
    PasswordMismatch,
}

/// Decide whether `record` may be served at `now` given the caller's password.
///
/// Passwords are compared verbatim; an empty supplied password counts as missing.
pub fn evaluate(record: &FileRecord, supplied_password: Option<&str>, now: DateTime<Utc>) -> Access {
    if is_expired(record, now) {
        return Access::Expired;
    }

    match (record.password.as_deref(), supplied_password.filter(|p| !p.is_empty())) {
        (None, _) => Access::Allow,
        (Some(_), None) => Access::PasswordRequired,
        (Some(expected), Some(supplied)) if expected == supplied => Access::Allow,
        (Some(_), Some(_)) => Access::PasswordMismatch,
    }
}

/// Expiry is strict: a record is still served at exactly `expires_at`.
pub fn is_expired(record: &FileRecord, now: DateTime<Utc>) -> bool {
    record.expires_at.is_some_and(|at| now > at)
}
