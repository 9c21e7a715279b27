//! Password digests
//!
//! A plain SHA-256 digest, base64 encoded. This keeps cleartext passwords out
//! of the database; it is not a password-hashing scheme.

use base64::prelude::*;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    BASE64_STANDARD.encode(digest)
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let candidate = hash_password(password);
    candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
