use std::fmt;

use shared::error::{Error, Result};

/// ProtectionProfile specifies Cipher and AuthTag details, similar to TLS cipher suite
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ProtectionProfile {
    #[default]
    Aes128CmHmacSha1_80 = 0x0001,
    Aes128CmHmacSha1_32 = 0x0002,
    AeadAes128Gcm = 0x0007,
}

pub const CS_AES_CM_128_HMAC_SHA1_80: &str = "AES_CM_128_HMAC_SHA1_80";
pub const CS_AES_CM_128_HMAC_SHA1_32: &str = "AES_CM_128_HMAC_SHA1_32";
pub const CS_AEAD_AES_128_GCM: &str = "AEAD_AES_128_GCM";

impl ProtectionProfile {
    pub fn key_len(&self) -> usize {
        16
    }

    pub fn salt_len(&self) -> usize {
        match *self {
            ProtectionProfile::Aes128CmHmacSha1_32 | ProtectionProfile::Aes128CmHmacSha1_80 => 14,
            ProtectionProfile::AeadAes128Gcm => 12,
        }
    }

    /// Total length of the SDES inline key material (master key followed by
    /// master salt).
    pub fn key_salt_len(&self) -> usize {
        self.key_len() + self.salt_len()
    }

    pub fn rtp_auth_tag_len(&self) -> usize {
        match *self {
            ProtectionProfile::Aes128CmHmacSha1_80 => 10,
            ProtectionProfile::Aes128CmHmacSha1_32 => 4,
            ProtectionProfile::AeadAes128Gcm => 0,
        }
    }

    pub fn rtcp_auth_tag_len(&self) -> usize {
        match *self {
            // RFC 3711 mandates the 80-bit tag for SRTCP even with the 32-bit
            // RTP profile.
            ProtectionProfile::Aes128CmHmacSha1_80 | ProtectionProfile::Aes128CmHmacSha1_32 => 10,
            ProtectionProfile::AeadAes128Gcm => 0,
        }
    }

    pub fn aead_auth_tag_len(&self) -> usize {
        match *self {
            ProtectionProfile::Aes128CmHmacSha1_80 | ProtectionProfile::Aes128CmHmacSha1_32 => 0,
            ProtectionProfile::AeadAes128Gcm => 16,
        }
    }

    pub fn auth_key_len(&self) -> usize {
        match *self {
            ProtectionProfile::Aes128CmHmacSha1_80 | ProtectionProfile::Aes128CmHmacSha1_32 => 20,
            ProtectionProfile::AeadAes128Gcm => 0,
        }
    }

    /// Bytes added to an RTP packet by protection.
    pub fn rtp_overhead(&self) -> usize {
        self.rtp_auth_tag_len() + self.aead_auth_tag_len()
    }

    /// Bytes added to an RTCP packet by protection, including the E-flag and
    /// SRTCP index word.
    pub fn rtcp_overhead(&self) -> usize {
        self.rtcp_auth_tag_len() + self.aead_auth_tag_len() + 4
    }

    /// Name used in SDES `a=crypto` lines.
    pub fn crypto_suite_name(&self) -> &'static str {
        match *self {
            ProtectionProfile::Aes128CmHmacSha1_80 => CS_AES_CM_128_HMAC_SHA1_80,
            ProtectionProfile::Aes128CmHmacSha1_32 => CS_AES_CM_128_HMAC_SHA1_32,
            ProtectionProfile::AeadAes128Gcm => CS_AEAD_AES_128_GCM,
        }
    }

    pub fn from_crypto_suite_name(name: &str) -> Result<Self> {
        match name {
            CS_AES_CM_128_HMAC_SHA1_80 => Ok(ProtectionProfile::Aes128CmHmacSha1_80),
            CS_AES_CM_128_HMAC_SHA1_32 => Ok(ProtectionProfile::Aes128CmHmacSha1_32),
            CS_AEAD_AES_128_GCM => Ok(ProtectionProfile::AeadAes128Gcm),
            _ => Err(Error::ErrSrtpUnknownCryptoSuite(name.to_owned())),
        }
    }
}

impl TryFrom<u16> for ProtectionProfile {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x0001 => Ok(ProtectionProfile::Aes128CmHmacSha1_80),
            0x0002 => Ok(ProtectionProfile::Aes128CmHmacSha1_32),
            0x0007 => Ok(ProtectionProfile::AeadAes128Gcm),
            _ => Err(Error::ErrNoSuchSrtpProfile),
        }
    }
}

impl fmt::Display for ProtectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.crypto_suite_name())
    }
}
