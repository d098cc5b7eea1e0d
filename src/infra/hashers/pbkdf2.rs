use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::TokenHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pbkdf2Digest {
    Sha256,
    Sha512,
}

impl Pbkdf2Digest {
    fn algorithm_id(&self) -> &'static str {
        match self {
            Pbkdf2Digest::Sha256 => "pbkdf2_sha256",
            Pbkdf2Digest::Sha512 => "pbkdf2_sha512",
        }
    }

    fn output_len(&self) -> usize {
        match self {
            Pbkdf2Digest::Sha256 => 32,
            Pbkdf2Digest::Sha512 => 64,
        }
    }
}

/// PBKDF2 token hasher with a self-describing stored form:
/// `<algorithm>$<iterations>$<salt>$<digest-hex>`.
///
/// Token secrets are full-entropy CSPRNG strings, not passwords, so the
/// iteration count can be tuned well below password-hashing guidance
/// without weakening the scheme.
pub struct Pbkdf2Hasher {
    digest: Pbkdf2Digest,
    iterations: u32,
    salt_length: usize,
}

impl Pbkdf2Hasher {
    pub fn new(digest: Pbkdf2Digest, iterations: u32, salt_length: usize) -> Self {
        Self {
            digest,
            iterations,
            salt_length,
        }
    }

    fn generate_salt(&self) -> String {
        let mut bytes = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn encode(&self, secret: &str, salt: &str, iterations: u32) -> String {
        let mut derived = vec![0u8; self.digest.output_len()];
        match self.digest {
            Pbkdf2Digest::Sha256 => pbkdf2_hmac::<Sha256>(
                secret.as_bytes(),
                salt.as_bytes(),
                iterations,
                &mut derived,
            ),
            Pbkdf2Digest::Sha512 => pbkdf2_hmac::<Sha512>(
                secret.as_bytes(),
                salt.as_bytes(),
                iterations,
                &mut derived,
            ),
        }
        format!(
            "{}${}${}${}",
            self.digest.algorithm_id(),
            iterations,
            salt,
            hex::encode(derived)
        )
    }
}

impl TokenHasher for Pbkdf2Hasher {
    fn hash(&self, secret: &str) -> String {
        self.encode(secret, &self.generate_salt(), self.iterations)
    }

    fn verify(&self, secret: &str, stored: &str) -> bool {
        // Re-derive with the parameters the digest was created with, not the
        // currently configured ones; malformed input is a mismatch, never an
        // error.
        let mut fields = stored.splitn(4, '$');
        let (Some(algorithm), Some(iterations), Some(salt), Some(_digest)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return false;
        };
        if algorithm != self.digest.algorithm_id() {
            return false;
        }
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        if iterations == 0 {
            return false;
        }

        let encoded = self.encode(secret, salt, iterations);
        encoded.as_bytes().ct_eq(stored.as_bytes()).into()
    }
}
