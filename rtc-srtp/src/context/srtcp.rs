use bytes::{Buf, BytesMut};
use rtcp::header::{HEADER_LENGTH, SSRC_LENGTH};
use shared::error::{Error, Result};

use super::Context;
use crate::cipher::SRTCP_INDEX_SIZE;
use crate::option::MAX_SRTCP_INDEX;

/// Sender SSRC of an RTCP packet, which follows the common header.
fn rtcp_ssrc(buf: &[u8]) -> Result<u32> {
    if buf.len() < HEADER_LENGTH + SSRC_LENGTH {
        return Err(Error::ErrTooShortRtcp);
    }
    Ok((&buf[HEADER_LENGTH..]).get_u32())
}

impl Context {
    /// DecryptRTCP decrypts a buffer that contains a RTCP packet
    pub fn decrypt_rtcp(&mut self, encrypted: &[u8]) -> Result<BytesMut> {
        let tail_len =
            SRTCP_INDEX_SIZE + self.cipher.rtcp_auth_tag_len() + self.cipher.aead_auth_tag_len();
        if encrypted.len() < HEADER_LENGTH + SSRC_LENGTH + tail_len {
            return Err(Error::SrtcpTooSmall(
                encrypted.len(),
                HEADER_LENGTH + SSRC_LENGTH + tail_len,
            ));
        }

        let index = self.cipher.get_rtcp_index(encrypted);
        let ssrc = rtcp_ssrc(encrypted)?;

        {
            let state = self.get_srtcp_ssrc_state(ssrc);
            if !state.replay_detector.check(index as u64) {
                return Err(Error::SrtcpSsrcDuplicated(ssrc, index));
            }
        }

        let dst = self.cipher.decrypt_rtcp(encrypted, index, ssrc)?;

        self.get_srtcp_ssrc_state(ssrc).replay_detector.accept();

        Ok(dst)
    }

    /// EncryptRTCP Encrypts a RTCP packet
    pub fn encrypt_rtcp(&mut self, decrypted: &[u8]) -> Result<BytesMut> {
        let ssrc = rtcp_ssrc(decrypted)?;

        let index = {
            let state = self.get_srtcp_ssrc_state(ssrc);
            state.srtcp_index += 1;
            if state.srtcp_index > MAX_SRTCP_INDEX as usize {
                state.srtcp_index = 0;
            }
            state.srtcp_index
        };

        self.cipher.encrypt_rtcp(decrypted, index, ssrc)
    }
}
