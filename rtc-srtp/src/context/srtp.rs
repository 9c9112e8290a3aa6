use bytes::BytesMut;
use rtp::header::Header;
use rtp_shared::marshal::Unmarshal;
use shared::error::{Error, Result};

use super::Context;

fn unmarshal_header(mut buf: &[u8]) -> Result<Header> {
    Header::unmarshal(&mut buf).map_err(|_| Error::ErrTooShortRtp)
}

impl Context {
    fn decrypt_rtp_with_header(
        &mut self,
        encrypted: &[u8],
        header: &Header,
    ) -> Result<BytesMut> {
        let roc = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, index) = state.next_rollover_count(header.sequence_number);
            if !state.replay_detector.check(index) {
                return Err(Error::SrtpSsrcDuplicated(
                    header.ssrc,
                    header.sequence_number,
                ));
            }
            roc
        };

        let dst = self.cipher.decrypt_rtp(encrypted, header, roc)?;

        {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            state.replay_detector.accept();
            state.update_rollover_count(header.sequence_number, roc);
        }

        Ok(dst)
    }

    /// DecryptRTP decrypts a RTP packet with an encrypted payload
    pub fn decrypt_rtp(&mut self, encrypted: &[u8]) -> Result<BytesMut> {
        let header = unmarshal_header(encrypted)?;
        self.decrypt_rtp_with_header(encrypted, &header)
    }

    fn encrypt_rtp_with_header(
        &mut self,
        plaintext: &[u8],
        header: &Header,
    ) -> Result<BytesMut> {
        let roc = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, _) = state.next_rollover_count(header.sequence_number);
            state.update_rollover_count(header.sequence_number, roc);
            roc
        };

        self.cipher.encrypt_rtp(plaintext, header, roc)
    }

    /// EncryptRTP encrypts a RTP packet. The returned buffer is the header in
    /// the clear, the encrypted payload and the auth tag.
    pub fn encrypt_rtp(&mut self, plaintext: &[u8]) -> Result<BytesMut> {
        let header = unmarshal_header(plaintext)?;
        self.encrypt_rtp_with_header(plaintext, &header)
    }
}
