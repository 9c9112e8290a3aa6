use serde::{Deserialize, Serialize};
use srtp::protection_profile::ProtectionProfile;

use crate::content::MediaType;

pub const DEFAULT_REPLAY_WINDOW: usize = 64;

/// ChannelConfig configures a single BaseChannel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Name of the content (m= section) the channel is bound to.
    pub content_name: String,
    pub media_type: MediaType,
    /// When set no RTCP transport is ever created and RTCP mux is active
    /// from the start.
    pub rtcp_mux_required: bool,
    pub enable_gcm_crypto_suites: bool,
    /// Lets audio channels prefer AES_CM_128_HMAC_SHA1_32 for DTLS-SRTP.
    pub enable_srtp_32bit_tag_for_audio: bool,
    /// Replay window for inbound SRTP, 0 disables replay protection.
    pub srtp_replay_window: usize,
    /// Replay window for inbound SRTCP, 0 disables replay protection.
    pub srtcp_replay_window: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            content_name: String::new(),
            media_type: MediaType::Audio,
            rtcp_mux_required: false,
            enable_gcm_crypto_suites: false,
            enable_srtp_32bit_tag_for_audio: false,
            srtp_replay_window: DEFAULT_REPLAY_WINDOW,
            srtcp_replay_window: DEFAULT_REPLAY_WINDOW,
        }
    }
}

impl ChannelConfig {
    pub fn new(content_name: &str, media_type: MediaType) -> Self {
        ChannelConfig {
            content_name: content_name.to_owned(),
            media_type,
            ..Default::default()
        }
    }

    /// srtp_protection_profiles lists the DTLS-SRTP profiles offered on a
    /// transport, most preferred first. The RTCP transport always gets the
    /// default list.
    pub fn srtp_protection_profiles(&self, rtcp: bool) -> Vec<ProtectionProfile> {
        let mut profiles = vec![];
        if self.enable_gcm_crypto_suites {
            profiles.push(ProtectionProfile::AeadAes128Gcm);
        }
        if !rtcp && self.media_type == MediaType::Audio && self.enable_srtp_32bit_tag_for_audio {
            profiles.push(ProtectionProfile::Aes128CmHmacSha1_32);
        }
        profiles.push(ProtectionProfile::Aes128CmHmacSha1_80);
        profiles
    }
}
