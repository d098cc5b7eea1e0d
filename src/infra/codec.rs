use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Internal parse diagnostics. Callers outside this module only ever see
/// these collapsed into a single invalid-token outcome; the distinction
/// exists for logging.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("token is empty")]
    Empty,
    #[error("token too short")]
    TooShort,
    #[error("token checksum mismatch")]
    ChecksumMismatch,
    #[error("token body lacks a ':' separator")]
    MissingSecretSeparator,
    #[error("token prefix lacks a '_' separator")]
    MissingPrefixSeparator,
    #[error("token secret is empty")]
    EmptySecret,
}

/// The value handed to a caller at create/rotate time. Neither the secret
/// nor the composed `token` string is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicToken {
    pub token: String,
    pub full_prefix: String,
    pub checksum: String,
    pub hint: String,
}

/// Generate a high-entropy alphanumeric secret from the OS CSPRNG.
pub fn generate_raw_secret(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Fixed-width decimal checksum: CRC-32 of `value`, reduced modulo
/// `10^digits` and zero-padded. Tamper-evident, not cryptographically
/// secure on its own.
pub fn compute_checksum(value: &str, digits: u32) -> String {
    let crc = crc32fast::hash(value.as_bytes());
    let reduced = crc % 10u32.pow(digits);
    format!("{reduced:0width$}", width = digits as usize)
}

/// Short display fragment derived from the checksum tail only. The prefix
/// is deliberately not reused here: a hint that embedded prefix material
/// would re-expose it after rotation.
fn build_hint(checksum: &str, hint_length: usize) -> String {
    let tail = hint_length.max(2).min(checksum.len());
    format!("\u{2026}{}", &checksum[checksum.len() - tail..])
}

/// Compose the public wire form `<namespace>_<identifier>:<secret><checksum>`.
pub fn build_public_token(
    namespace: &str,
    identifier: &str,
    secret: &str,
    checksum_digits: u32,
    hint_length: usize,
) -> PublicToken {
    let full_prefix = format!("{namespace}_{identifier}");
    let body = format!("{full_prefix}:{secret}");
    let checksum = compute_checksum(&body, checksum_digits);
    let token = format!("{body}{checksum}");
    let hint = build_hint(&checksum, hint_length);

    PublicToken {
        token,
        full_prefix,
        checksum,
        hint,
    }
}

/// Split a raw public token into `(full_prefix, secret)`, validating the
/// trailing checksum. The checksum comparison is constant-time; a mismatch
/// must not be distinguishable by timing from a match-length scan.
pub fn parse_public_token(raw: &str, checksum_digits: u32) -> Result<(String, String), CodecError> {
    if raw.is_empty() {
        return Err(CodecError::Empty);
    }

    let checksum_len = checksum_digits as usize;
    // Must at least fit <n>_<id>:<secret> ahead of the checksum.
    if raw.len() <= checksum_len + 3 {
        return Err(CodecError::TooShort);
    }
    if !raw.is_char_boundary(raw.len() - checksum_len) {
        return Err(CodecError::TooShort);
    }

    let (body, provided) = raw.split_at(raw.len() - checksum_len);
    let expected = compute_checksum(body, checksum_digits);

    if provided.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 0 {
        return Err(CodecError::ChecksumMismatch);
    }

    let Some((full_prefix, secret)) = body.split_once(':') else {
        return Err(CodecError::MissingSecretSeparator);
    };
    if !full_prefix.contains('_') {
        return Err(CodecError::MissingPrefixSeparator);
    }
    if secret.is_empty() {
        return Err(CodecError::EmptySecret);
    }

    Ok((full_prefix.to_string(), secret.to_string()))
}
