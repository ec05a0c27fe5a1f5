use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const ROUNDS: u32 = 10_000;
const SALT_LEN: usize = 16;

/// Salted, stretched SHA-256 in the form `sha256$<rounds>$<salt>$<digest>`.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    let digest = stretch(&salt, password, ROUNDS);
    format!(
        "{}${}${}${}",
        SCHEME,
        ROUNDS,
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// False for a wrong password and for anything that is not a stored hash,
/// including the empty hash of accounts created without a password.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }

    let (Ok(rounds), Ok(salt), Ok(expected)) = (
        rounds.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    if rounds == 0 {
        return false;
    }

    constant_time_eq(&stretch(&salt, password, rounds), &expected)
}

fn stretch(salt: &[u8], password: &str, rounds: u32) -> Vec<u8> {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .to_vec();
    for _ in 1..rounds {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(&digest)
            .finalize()
            .to_vec();
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_only_the_same_password() {
        let stored = hash_password("Secr3t!pass");
        assert!(stored.starts_with("sha256$10000$"));
        assert!(verify_password("Secr3t!pass", &stored));
        assert!(!verify_password("Secr3t!pasS", &stored));
    }

    #[test]
    fn test_same_password_gets_a_fresh_salt() {
        assert_ne!(hash_password("Secr3t!pass"), hash_password("Secr3t!pass"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("Secr3t!pass", "plain"));
        assert!(!verify_password("Secr3t!pass", "sha256$0$00$00"));
        assert!(!verify_password("Secr3t!pass", "md5$1$00$00"));
    }
}
