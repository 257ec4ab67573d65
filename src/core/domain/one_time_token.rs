// src/core/domain/one_time_token.rs

use super::ids::TokenAccessor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short-lived, single-use secret linked to a token accessor. Exchanging it
/// is an atomic delete-and-return, never a read-then-delete: two concurrent
/// exchanges must not both succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimeToken {
    pub one_time_secret: String,
    pub accessor_id: TokenAccessor,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
