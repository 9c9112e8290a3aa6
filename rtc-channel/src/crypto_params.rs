use std::fmt;

use base64::{Engine, prelude::BASE64_STANDARD};
use shared::error::{Error, Result};
use shared::util::random_bytes;
use srtp::protection_profile::ProtectionProfile;

const KEY_METHOD_INLINE: &str = "inline:";

/// CryptoParams is one a=crypto line (RFC 4568) of a media description.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct CryptoParams {
    pub tag: u32,
    pub cipher_suite: String,
    /// `inline:<base64(key||salt)>[|lifetime][|mki:length]`
    pub key_params: String,
    pub session_params: String,
}

impl fmt::Debug for CryptoParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoParams")
            .field("tag", &self.tag)
            .field("cipher_suite", &self.cipher_suite)
            .field("key_params", &"<redacted>")
            .field("session_params", &self.session_params)
            .finish()
    }
}

impl CryptoParams {
    /// new_random builds a crypto line with a fresh inline master key and
    /// salt for `profile`.
    pub fn new_random(tag: u32, profile: ProtectionProfile) -> Self {
        let mut key_salt = random_bytes(profile.key_salt_len());
        let key_params = format!("{KEY_METHOD_INLINE}{}", BASE64_STANDARD.encode(&key_salt));
        key_salt.fill(0);

        CryptoParams {
            tag,
            cipher_suite: profile.crypto_suite_name().to_owned(),
            key_params,
            session_params: String::new(),
        }
    }

    /// matches tells whether an answered crypto line selects this offered one.
    pub fn matches(&self, other: &CryptoParams) -> bool {
        self.tag == other.tag && self.cipher_suite == other.cipher_suite
    }

    pub fn profile(&self) -> Result<ProtectionProfile> {
        ProtectionProfile::from_crypto_suite_name(&self.cipher_suite)
    }
}

/// parse_key_params extracts the concatenated master key and salt from the
/// key parameters of a crypto line. Only the inline key method is supported
/// and the decoded material must be exactly `expected_len` bytes.
pub fn parse_key_params(key_params: &str, expected_len: usize) -> Result<Vec<u8>> {
    let encoded = key_params
        .strip_prefix(KEY_METHOD_INLINE)
        .ok_or(Error::ErrSrtpInvalidKeyParams)?;
    // Lifetime and MKI follow the key, separated by '|'.
    let encoded = encoded.split('|').next().unwrap_or_default();

    let mut key_salt = BASE64_STANDARD
        .decode(encoded)
        .map_err(|_| Error::ErrSrtpInvalidKeyParams)?;
    if key_salt.len() != expected_len {
        key_salt.fill(0);
        return Err(Error::ErrSrtpInvalidKeyParams);
    }

    Ok(key_salt)
}
