use std::fmt;

use shared::crypto::{DTLS_SRTP_EXPORTER_LABEL, KeyingMaterialExporter};
use shared::error::{Error, Result};

use super::option::*;
use super::protection_profile::*;

/// SessionKeys bundles the keys required to setup an SRTP session
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub local_master_key: Vec<u8>,
    pub local_master_salt: Vec<u8>,
    pub remote_master_key: Vec<u8>,
    pub remote_master_salt: Vec<u8>,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("local_master_key", &"<redacted>")
            .field("local_master_salt", &"<redacted>")
            .field("remote_master_key", &"<redacted>")
            .field("remote_master_salt", &"<redacted>")
            .finish()
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.local_master_key.fill(0);
        self.local_master_salt.fill(0);
        self.remote_master_key.fill(0);
        self.remote_master_salt.fill(0);
    }
}

/// Config is used to configure a session.
/// You can provide either a KeyingMaterialExporter to export keys
/// or directly pass the keys themselves.
/// After a Config is passed to a session it must not be modified.
#[derive(Default)]
pub struct Config {
    pub keys: SessionKeys,
    pub profile: ProtectionProfile,

    /// List of local/remote context options.
    /// ReplayProtection is enabled on remote context by default.
    /// Default replay protection window size is 64.
    pub local_rtp_options: Option<ContextOption>,
    pub remote_rtp_options: Option<ContextOption>,

    pub local_rtcp_options: Option<ContextOption>,
    pub remote_rtcp_options: Option<ContextOption>,
}

impl Config {
    /// ExtractSessionKeysFromDTLS allows setting the Config SessionKeys by
    /// extracting them from DTLS. This behavior is defined in RFC5764:
    /// https://tools.ietf.org/html/rfc5764
    ///
    /// The exported block is client_write_key, server_write_key,
    /// client_write_salt, server_write_salt. A client sends with the client
    /// half and receives with the server half.
    pub fn extract_session_keys_from_dtls<E: KeyingMaterialExporter + ?Sized>(
        &mut self,
        exporter: &E,
        is_client: bool,
    ) -> Result<()> {
        let key_len = self.profile.key_len();
        let salt_len = self.profile.salt_len();
        let total_len = (key_len * 2) + (salt_len * 2);

        let mut keying_material = exporter
            .export_keying_material(DTLS_SRTP_EXPORTER_LABEL, &[], total_len)
            .map_err(|e| Error::ErrDtlsSrtpKeyExport(e.to_string()))?;
        if keying_material.len() != total_len {
            let len = keying_material.len();
            keying_material.fill(0);
            return Err(Error::ErrDtlsSrtpKeyExport(format!(
                "exported {len} bytes, expected {total_len}"
            )));
        }

        let mut offset = 0;
        let client_write_key = keying_material[offset..offset + key_len].to_vec();
        offset += key_len;

        let server_write_key = keying_material[offset..offset + key_len].to_vec();
        offset += key_len;

        let client_write_salt = keying_material[offset..offset + salt_len].to_vec();
        offset += salt_len;

        let server_write_salt = keying_material[offset..offset + salt_len].to_vec();
        keying_material.fill(0);

        let keys = if is_client {
            SessionKeys {
                local_master_key: client_write_key,
                local_master_salt: client_write_salt,
                remote_master_key: server_write_key,
                remote_master_salt: server_write_salt,
            }
        } else {
            SessionKeys {
                local_master_key: server_write_key,
                local_master_salt: server_write_salt,
                remote_master_key: client_write_key,
                remote_master_salt: client_write_salt,
            }
        };
        self.keys = keys;

        Ok(())
    }
}
