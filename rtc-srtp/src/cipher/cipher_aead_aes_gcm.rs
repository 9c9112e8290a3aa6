use aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce, Tag};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use rtcp::header::{HEADER_LENGTH, SSRC_LENGTH};
use rtp::header::Header;
use rtp_shared::marshal::MarshalSize;
use shared::error::{Error, Result};

use super::{Cipher, SRTCP_INDEX_SIZE};
use crate::key_derivation::*;
use crate::protection_profile::ProtectionProfile;

pub(crate) const CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN: usize = 16;

const RTCP_ENCRYPTION_FLAG: u8 = 0x80;

/// AEAD Cipher based on AES-128 GCM, RFC 7714.
pub(crate) struct CipherAeadAesGcm {
    profile: ProtectionProfile,
    srtp_cipher: Aes128Gcm,
    srtcp_cipher: Aes128Gcm,
    srtp_session_salt: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
}

impl CipherAeadAesGcm {
    /// Create a new AEAD instance.
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<CipherAeadAesGcm> {
        let key_len = profile.key_len();
        let salt_len = profile.salt_len();

        let srtp_session_key =
            aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, master_key, master_salt, key_len)?;
        let srtp_cipher = Aes128Gcm::new_from_slice(&srtp_session_key)
            .map_err(|_| Error::ErrInvalidCipherLength)?;

        let srtcp_session_key =
            aes_cm_key_derivation(LABEL_SRTCP_ENCRYPTION, master_key, master_salt, key_len)?;
        let srtcp_cipher = Aes128Gcm::new_from_slice(&srtcp_session_key)
            .map_err(|_| Error::ErrInvalidCipherLength)?;

        let srtp_session_salt =
            aes_cm_key_derivation(LABEL_SRTP_SALT, master_key, master_salt, salt_len)?;
        let srtcp_session_salt =
            aes_cm_key_derivation(LABEL_SRTCP_SALT, master_key, master_salt, salt_len)?;

        Ok(CipherAeadAesGcm {
            profile,
            srtp_cipher,
            srtcp_cipher,
            srtp_session_salt,
            srtcp_session_salt,
        })
    }

    /// The 12-octet IV used by AES-GCM SRTP is formed by first concatenating
    /// 2 octets of zeroes, the 4-octet SSRC, the 4-octet rollover counter
    /// (ROC), and the 2-octet sequence number (SEQ).  The resulting 12-octet
    /// value is then XORed to the 12-octet salt to form the 12-octet IV.
    ///
    /// https://tools.ietf.org/html/rfc7714#section-8.1
    fn rtp_initialization_vector(&self, header: &Header, roc: u32) -> [u8; 12] {
        let mut iv = [0u8; 12];
        BigEndian::write_u32(&mut iv[2..], header.ssrc);
        BigEndian::write_u32(&mut iv[6..], roc);
        BigEndian::write_u16(&mut iv[10..], header.sequence_number);

        for (i, v) in iv.iter_mut().enumerate() {
            *v ^= self.srtp_session_salt[i];
        }

        iv
    }

    /// The 12-octet IV used by AES-GCM SRTCP is formed by first
    /// concatenating 2 octets of zeroes, the 4-octet SSRC identifier,
    /// 2 octets of zeroes, a single "0" bit, and the 31-bit SRTCP index.
    /// The resulting 12-octet value is then XORed to the 12-octet salt to
    /// form the 12-octet IV.
    ///
    /// https://tools.ietf.org/html/rfc7714#section-9.1
    fn rtcp_initialization_vector(&self, srtcp_index: usize, ssrc: u32) -> [u8; 12] {
        let mut iv = [0u8; 12];

        BigEndian::write_u32(&mut iv[2..], ssrc);
        BigEndian::write_u32(&mut iv[8..], srtcp_index as u32);

        for (i, v) in iv.iter_mut().enumerate() {
            *v ^= self.srtcp_session_salt[i];
        }

        iv
    }

    /// In an SRTCP packet, a 1-bit Encryption flag is prepended to the
    /// 31-bit SRTCP index to form a 32-bit value we shall call the
    /// "ESRTCP word"
    ///
    /// https://tools.ietf.org/html/rfc7714#section-17
    fn rtcp_additional_authenticated_data(
        &self,
        rtcp_packet: &[u8],
        srtcp_index: usize,
    ) -> [u8; 12] {
        let mut aad = [0u8; 12];

        aad[..HEADER_LENGTH + SSRC_LENGTH].copy_from_slice(&rtcp_packet[..HEADER_LENGTH + SSRC_LENGTH]);

        BigEndian::write_u32(&mut aad[8..], srtcp_index as u32);

        aad[8] |= RTCP_ENCRYPTION_FLAG;
        aad
    }
}

impl Cipher for CipherAeadAesGcm {
    fn rtp_auth_tag_len(&self) -> usize {
        self.profile.rtp_auth_tag_len()
    }

    fn rtcp_auth_tag_len(&self) -> usize {
        self.profile.rtcp_auth_tag_len()
    }

    fn aead_auth_tag_len(&self) -> usize {
        self.profile.aead_auth_tag_len()
    }

    fn get_rtcp_index(&self, input: &[u8]) -> usize {
        let pos = input.len() - SRTCP_INDEX_SIZE;
        (BigEndian::read_u32(&input[pos..]) & !((RTCP_ENCRYPTION_FLAG as u32) << 24)) as usize
    }

    fn encrypt_rtp(&mut self, payload: &[u8], header: &Header, roc: u32) -> Result<BytesMut> {
        let mut writer =
            BytesMut::with_capacity(payload.len() + CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN);
        writer.extend_from_slice(payload);

        let nonce = self.rtp_initialization_vector(header, roc);
        let (aad, body) = writer.split_at_mut(header.marshal_size());
        let tag = self
            .srtp_cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, body)
            .map_err(|e| Error::OtherSrtpErr(e.to_string()))?;
        writer.extend_from_slice(&tag);

        Ok(writer)
    }

    fn decrypt_rtp(
        &mut self,
        ciphertext: &[u8],
        header: &Header,
        roc: u32,
    ) -> Result<BytesMut> {
        let header_len = header.marshal_size();
        if ciphertext.len() < header_len + CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN {
            return Err(Error::SrtpTooSmall(
                ciphertext.len(),
                header_len + CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN,
            ));
        }

        let tag_offset = ciphertext.len() - CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN;
        let mut writer = BytesMut::from(&ciphertext[..tag_offset]);

        let nonce = self.rtp_initialization_vector(header, roc);
        let (aad, body) = writer.split_at_mut(header_len);
        self.srtp_cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&nonce),
                aad,
                body,
                Tag::from_slice(&ciphertext[tag_offset..]),
            )
            .map_err(|_| Error::ErrFailedToVerifyAuthTag)?;

        Ok(writer)
    }

    fn encrypt_rtcp(
        &mut self,
        decrypted: &[u8],
        srtcp_index: usize,
        ssrc: u32,
    ) -> Result<BytesMut> {
        let mut writer = BytesMut::with_capacity(
            decrypted.len() + CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN + SRTCP_INDEX_SIZE,
        );
        writer.extend_from_slice(decrypted);

        let iv = self.rtcp_initialization_vector(srtcp_index, ssrc);
        let aad = self.rtcp_additional_authenticated_data(decrypted, srtcp_index);

        let tag = self
            .srtcp_cipher
            .encrypt_in_place_detached(
                Nonce::from_slice(&iv),
                &aad,
                &mut writer[HEADER_LENGTH + SSRC_LENGTH..],
            )
            .map_err(|e| Error::OtherSrtpErr(e.to_string()))?;

        writer.extend_from_slice(&tag);
        writer.put_slice(&aad[8..]);

        Ok(writer)
    }

    fn decrypt_rtcp(
        &mut self,
        encrypted: &[u8],
        srtcp_index: usize,
        ssrc: u32,
    ) -> Result<BytesMut> {
        let min_len = HEADER_LENGTH + SSRC_LENGTH + CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN + SRTCP_INDEX_SIZE;
        if encrypted.len() < min_len {
            return Err(Error::SrtcpTooSmall(encrypted.len(), min_len));
        }

        let index_offset = encrypted.len() - SRTCP_INDEX_SIZE;
        if encrypted[index_offset] & RTCP_ENCRYPTION_FLAG == 0 {
            // Unencrypted SRTCP is never produced here and is not accepted.
            return Err(Error::RtcpFailedToVerifyAuthTag);
        }

        let tag_offset = index_offset - CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN;
        let mut writer = BytesMut::from(&encrypted[..tag_offset]);

        let iv = self.rtcp_initialization_vector(srtcp_index, ssrc);
        let aad = self.rtcp_additional_authenticated_data(encrypted, srtcp_index);

        self.srtcp_cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&iv),
                &aad,
                &mut writer[HEADER_LENGTH + SSRC_LENGTH..],
                Tag::from_slice(&encrypted[tag_offset..index_offset]),
            )
            .map_err(|_| Error::RtcpFailedToVerifyAuthTag)?;

        Ok(writer)
    }
}
