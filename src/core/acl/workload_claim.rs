// src/core/acl/workload_claim.rs

//! Verification of signed workload claims: opaque tokens whose payload names
//! the allocation the workload belongs to. Grounded on
//! `aerodb::auth::jwt::JwtManager` (stateless `jsonwebtoken` validation, no
//! DB lookup needed to check the signature itself).

use crate::core::domain::AllocId;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

pub const WORKLOAD_CLAIM_PREFIX: &str = "wlc.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadClaims {
    /// Subject: the allocation this claim was minted for.
    pub alloc_id: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadClaimError {
    Malformed,
    BadSignature,
    Expired,
}

#[derive(Clone)]
pub struct WorkloadClaimVerifier {
    decoding_key: DecodingKey,
    issuer: String,
}

impl WorkloadClaimVerifier {
    pub fn new(signing_key: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(signing_key),
            issuer: issuer.into(),
        }
    }

    /// Verifies `credential` (with the `wlc.` prefix already stripped) and
    /// returns the allocation it is scoped to.
    pub fn verify(&self, raw_claim: &str) -> Result<AllocId, WorkloadClaimError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<WorkloadClaims>(raw_claim, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => WorkloadClaimError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    WorkloadClaimError::BadSignature
                }
                _ => WorkloadClaimError::Malformed,
            })?;

        let claims = token_data.claims;
        if claims.exp <= Utc::now().timestamp() {
            return Err(WorkloadClaimError::Expired);
        }
        if claims.alloc_id.is_empty() {
            return Err(WorkloadClaimError::Malformed);
        }
        Ok(AllocId(claims.alloc_id))
    }
}

/// Constant-time comparison used for the client-node bootstrap-secret check,
/// so a timing side channel can't be used to brute-force the secret.
pub fn secrets_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
