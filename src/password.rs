//! Password hashing with bcrypt.

use bcrypt::BcryptError;

pub use bcrypt::DEFAULT_COST;

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash with an explicit cost. Tests use the minimum cost to stay fast.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check `password` against a stored hash.
///
/// A corrupt hash is an error, not a mismatch.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(password, hash)
}
