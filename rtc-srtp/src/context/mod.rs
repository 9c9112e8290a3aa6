
pub mod srtcp;
pub mod srtp;

use std::collections::HashMap;

use shared::error::{Error, Result};
use shared::replay_detector::ReplayDetector;

use crate::cipher::Cipher;
use crate::cipher::cipher_aead_aes_gcm::CipherAeadAesGcm;
use crate::cipher::cipher_aes_cm_hmac_sha1::CipherAesCmHmacSha1;
use crate::option::*;
use crate::protection_profile::ProtectionProfile;

pub(crate) const MAX_SEQUENCE_NUMBER: u16 = 65535;

/// Encrypt/Decrypt state for a single SRTP SSRC
pub(crate) struct SrtpSsrcState {
    ssrc: u32,
    index: u64,
    rollover_has_processed: bool,
    replay_detector: Box<dyn ReplayDetector + Send + 'static>,
}

/// Encrypt/Decrypt state for a single SRTCP SSRC
pub(crate) struct SrtcpSsrcState {
    srtcp_index: usize,
    ssrc: u32,
    replay_detector: Box<dyn ReplayDetector + Send + 'static>,
}

impl SrtpSsrcState {
    /// next_rollover_count estimates the rollover counter of an incoming
    /// sequence number against the highest index seen so far
    /// (RFC 3711 appendix A) and returns it with the resulting packet index.
    pub(crate) fn next_rollover_count(&self, sequence_number: u16) -> (u32, u64) {
        let local_roc = (self.index >> 16) as u32;
        let local_seq = self.index as u16;

        let guess_roc = if !self.rollover_has_processed {
            local_roc
        } else if local_seq < MAX_SEQUENCE_NUMBER / 2 {
            if sequence_number > local_seq
                && sequence_number - local_seq > MAX_SEQUENCE_NUMBER / 2
                && local_roc > 0
            {
                // Late packet from before the last wrap.
                local_roc - 1
            } else {
                local_roc
            }
        } else if local_seq - MAX_SEQUENCE_NUMBER / 2 > sequence_number {
            local_roc.wrapping_add(1)
        } else {
            local_roc
        };

        (guess_roc, ((guess_roc as u64) << 16) | sequence_number as u64)
    }

    /// update_rollover_count advances the highest seen index once a packet
    /// with the given rollover counter has been processed.
    pub(crate) fn update_rollover_count(&mut self, sequence_number: u16, roc: u32) {
        let index = ((roc as u64) << 16) | sequence_number as u64;
        if !self.rollover_has_processed || index > self.index {
            self.index = index;
        }
        self.rollover_has_processed = true;
    }
}

/// Context represents a SRTP cryptographic context.
/// Context can only be used for one-way operations.
/// it must either used ONLY for encryption or ONLY for decryption.
/// Note that Context does not provide any concurrency protection:
/// access to a Context from multiple threads requires external locking.
pub struct Context {
    cipher: Box<dyn Cipher + Send>,
    profile: ProtectionProfile,

    srtp_ssrc_states: HashMap<u32, SrtpSsrcState>,
    srtcp_ssrc_states: HashMap<u32, SrtcpSsrcState>,

    new_srtp_replay_detector: ContextOption,
    new_srtcp_replay_detector: ContextOption,
}

impl Context {
    /// CreateContext creates a new SRTP Context
    pub fn new(
        master_key: &[u8],
        master_salt: &[u8],
        profile: ProtectionProfile,
        srtp_ctx_opt: Option<ContextOption>,
        srtcp_ctx_opt: Option<ContextOption>,
    ) -> Result<Context> {
        let key_len = profile.key_len();
        let salt_len = profile.salt_len();

        if master_key.len() != key_len {
            return Err(Error::SrtpMasterKeyLength(key_len, master_key.len()));
        } else if master_salt.len() != salt_len {
            return Err(Error::SrtpSaltLength(salt_len, master_salt.len()));
        }

        let cipher: Box<dyn Cipher + Send> = match profile {
            ProtectionProfile::Aes128CmHmacSha1_32 | ProtectionProfile::Aes128CmHmacSha1_80 => {
                Box::new(CipherAesCmHmacSha1::new(profile, master_key, master_salt)?)
            }
            ProtectionProfile::AeadAes128Gcm => {
                Box::new(CipherAeadAesGcm::new(profile, master_key, master_salt)?)
            }
        };

        let srtp_ctx_opt = if let Some(ctx_opt) = srtp_ctx_opt {
            ctx_opt
        } else {
            srtp_no_replay_protection()
        };

        let srtcp_ctx_opt = if let Some(ctx_opt) = srtcp_ctx_opt {
            ctx_opt
        } else {
            srtcp_no_replay_protection()
        };

        Ok(Context {
            cipher,
            profile,
            srtp_ssrc_states: HashMap::new(),
            srtcp_ssrc_states: HashMap::new(),
            new_srtp_replay_detector: srtp_ctx_opt,
            new_srtcp_replay_detector: srtcp_ctx_opt,
        })
    }

    pub fn profile(&self) -> ProtectionProfile {
        self.profile
    }

    fn get_srtp_ssrc_state(&mut self, ssrc: u32) -> &mut SrtpSsrcState {
        let new_replay_detector = &self.new_srtp_replay_detector;
        self.srtp_ssrc_states
            .entry(ssrc)
            .or_insert_with(|| SrtpSsrcState {
                ssrc,
                index: 0,
                rollover_has_processed: false,
                replay_detector: new_replay_detector(),
            })
    }

    fn get_srtcp_ssrc_state(&mut self, ssrc: u32) -> &mut SrtcpSsrcState {
        let new_replay_detector = &self.new_srtcp_replay_detector;
        self.srtcp_ssrc_states
            .entry(ssrc)
            .or_insert_with(|| SrtcpSsrcState {
                ssrc,
                srtcp_index: 0,
                replay_detector: new_replay_detector(),
            })
    }

    /// roc returns SRTP rollover counter of specified SSRC.
    pub fn get_roc(&self, ssrc: u32) -> Option<u32> {
        self.srtp_ssrc_states
            .get(&ssrc)
            .map(|s| (s.index >> 16) as u32)
    }

    /// set_roc sets SRTP rollover counter of specified SSRC.
    pub fn set_roc(&mut self, ssrc: u32, roc: u32) {
        let state = self.get_srtp_ssrc_state(ssrc);
        state.index = (roc as u64) << 16;
        state.rollover_has_processed = false;
    }

    /// index returns SRTCP index value of specified SSRC.
    pub fn get_index(&self, ssrc: u32) -> Option<usize> {
        self.srtcp_ssrc_states.get(&ssrc).map(|s| s.srtcp_index)
    }

    /// set_index sets SRTCP index value of specified SSRC.
    pub fn set_index(&mut self, ssrc: u32, index: usize) {
        self.get_srtcp_ssrc_state(ssrc).srtcp_index = index % (MAX_SRTCP_INDEX as usize + 1);
    }
}
