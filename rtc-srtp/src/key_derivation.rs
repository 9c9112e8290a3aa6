use aes::cipher::{KeyIvInit, StreamCipher};
use shared::error::{Error, Result};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

pub const LABEL_SRTP_ENCRYPTION: u8 = 0x00;
pub const LABEL_SRTP_AUTHENTICATION_TAG: u8 = 0x01;
pub const LABEL_SRTP_SALT: u8 = 0x02;
pub const LABEL_SRTCP_ENCRYPTION: u8 = 0x03;
pub const LABEL_SRTCP_AUTHENTICATION_TAG: u8 = 0x04;
pub const LABEL_SRTCP_SALT: u8 = 0x05;

/// aes_cm_key_derivation is the AES-CM PRF of RFC 3711 section 4.3.3 with a
/// key derivation rate of zero: the master salt, with the label xored into
/// byte 7, is the counter block for an AES-CTR keystream over zeros.
pub(crate) fn aes_cm_key_derivation(
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    out_len: usize,
) -> Result<Vec<u8>> {
    if master_salt.len() > 14 {
        return Err(Error::SrtpSaltLength(14, master_salt.len()));
    }

    let mut prf_in = [0u8; 16];
    prf_in[..master_salt.len()].copy_from_slice(master_salt);
    prf_in[7] ^= label;

    let mut out = vec![0u8; out_len];
    let mut stream = Aes128Ctr::new_from_slices(master_key, &prf_in)
        .map_err(|_| Error::SrtpMasterKeyLength(16, master_key.len()))?;
    stream.apply_keystream(&mut out);

    Ok(out)
}

/// Generate IV https://tools.ietf.org/html/rfc3711#section-4.1.1
/// where the 128-bit integer value IV SHALL be defined by the SSRC, the
/// SRTP packet index i, and the SRTP session salting key k_s, as below.
/// - ROC = a 32-bit unsigned rollover counter (roc), which records how many
///   times the 16-bit RTP sequence number has been reset to zero after
///   passing through 65,535
/// ```nobuild
/// i = 2^16 * roc + SEQ
/// IV = (salt*2 ^ 16) | (ssrc*2 ^ 64) | (i*2 ^ 16)
/// ```
pub(crate) fn generate_counter(
    sequence_number: u16,
    rollover_counter: u32,
    ssrc: u32,
    session_salt: &[u8],
) -> [u8; 16] {
    let mut counter = [0u8; 16];

    counter[4..8].copy_from_slice(&ssrc.to_be_bytes());
    counter[8..12].copy_from_slice(&rollover_counter.to_be_bytes());
    counter[12..14].copy_from_slice(&sequence_number.to_be_bytes());

    for (c, s) in counter.iter_mut().zip(session_salt.iter()) {
        *c ^= s;
    }

    counter
}

#[cfg(test)]
mod test {
    use super::*;

    // RFC 3711 appendix B.3
    const MASTER_KEY: [u8; 16] = [
        0xE1, 0xF9, 0x7A, 0x0D, 0x3E, 0x01, 0x8B, 0xE0, 0xD6, 0x4F, 0xA3, 0x2C, 0x06, 0xDE, 0x41,
        0x39,
    ];
    const MASTER_SALT: [u8; 14] = [
        0x0E, 0xC6, 0x75, 0xAD, 0x49, 0x8A, 0xFE, 0xEB, 0xB6, 0x96, 0x0B, 0x3A, 0xAB, 0xE6,
    ];

    #[test]
    fn test_valid_session_keys() -> Result<()> {
        let expected_session_key = vec![
            0xC6, 0x1E, 0x7A, 0x93, 0x74, 0x4F, 0x39, 0xEE, 0x10, 0x73, 0x4A, 0xFE, 0x3F, 0xF7,
            0xA0, 0x87,
        ];
        let expected_session_salt = vec![
            0x30, 0xCB, 0xBC, 0x08, 0x86, 0x3D, 0x8C, 0x85, 0xD4, 0x9D, 0xB3, 0x4A, 0x9A, 0xE1,
        ];
        let expected_session_auth_tag = vec![
            0xCE, 0xBE, 0x32, 0x1F, 0x6F, 0xF7, 0x71, 0x6B, 0x6F, 0xD4, 0xAB, 0x49, 0xAF, 0x25,
            0x6A, 0x15, 0x6D, 0x38, 0xBA, 0xA4,
        ];

        let session_key =
            aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 16)?;
        assert_eq!(session_key, expected_session_key, "session key mismatch");

        let session_salt = aes_cm_key_derivation(LABEL_SRTP_SALT, &MASTER_KEY, &MASTER_SALT, 14)?;
        assert_eq!(session_salt, expected_session_salt, "session salt mismatch");

        let session_auth_tag = aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            &MASTER_KEY,
            &MASTER_SALT,
            20,
        )?;
        assert_eq!(
            session_auth_tag, expected_session_auth_tag,
            "session auth tag mismatch"
        );

        Ok(())
    }

    #[test]
    fn test_srtcp_labels_differ() -> Result<()> {
        let rtp = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 16)?;
        let rtcp = aes_cm_key_derivation(LABEL_SRTCP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 16)?;
        assert_ne!(rtp, rtcp);
        Ok(())
    }

    #[test]
    fn test_invalid_master_key() {
        let result = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &[0u8; 15], &MASTER_SALT, 16);
        assert_eq!(result, Err(Error::SrtpMasterKeyLength(16, 15)));
    }

    #[test]
    fn test_generate_counter() {
        let session_salt = [0u8; 14];
        let counter = generate_counter(32846, 0, 4160032510, &session_salt);
        let expected = [
            0x00, 0x00, 0x00, 0x00, 0xf7, 0xf5, 0x0e, 0xfe, 0x00, 0x00, 0x00, 0x00, 0x80, 0x4e,
            0x00, 0x00,
        ];
        assert_eq!(counter, expected);
    }
}
