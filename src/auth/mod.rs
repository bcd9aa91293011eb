use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Header carrying the bearer session token.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

const SALT_LEN: usize = 16;

/// Random alphanumeric string drawn from the thread-local CSPRNG.
pub fn generate_random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Salted SHA-256 digest in `salt$hex` form.
pub fn hash_password(password: &str) -> String {
    let salt = generate_random_token(SALT_LEN);
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match hash.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
