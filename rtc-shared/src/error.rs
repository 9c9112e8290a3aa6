#![allow(dead_code)]

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("packet too big")]
    ErrPacketTooBig,
    #[error("invalid packet size {0}")]
    ErrInvalidPacketSize(usize),
    #[error("mutex poison: {0}")]
    PoisonError(String),

    //SRTP
    #[error("duplicated packet")]
    ErrDuplicated,
    #[error("SRTP master key is not long enough")]
    ErrShortSrtpMasterKey,
    #[error("SRTP master salt is not long enough")]
    ErrShortSrtpMasterSalt,
    #[error("no such SRTP Profile")]
    ErrNoSuchSrtpProfile,
    #[error("exporter called with wrong label")]
    ErrExporterWrongLabel,
    #[error("failed to verify auth tag")]
    ErrFailedToVerifyAuthTag,
    #[error("packet is too short to be RTP packet")]
    ErrTooShortRtp,
    #[error("packet is too short to be RTCP packet")]
    ErrTooShortRtcp,
    #[error("SRTP Master Key must be len {0}, got {1}")]
    SrtpMasterKeyLength(usize, usize),
    #[error("SRTP Salt must be len {0}, got {1}")]
    SrtpSaltLength(usize, usize),
    #[error("srtp ssrc={0} index={1}: duplicated")]
    SrtpSsrcDuplicated(u32, u16),
    #[error("srtcp ssrc={0} index={1}: duplicated")]
    SrtcpSsrcDuplicated(u32, usize),
    #[error("too short SRTP packet: only {0} bytes, expected > {1} bytes")]
    SrtpTooSmall(usize, usize),
    #[error("too short SRTCP packet: only {0} bytes, expected > {1} bytes")]
    SrtcpTooSmall(usize, usize),
    #[error("failed to verify rtp auth tag")]
    RtpFailedToVerifyAuthTag,
    #[error("too short auth tag: only {0} bytes, expected > {1} bytes")]
    RtcpInvalidLengthAuthTag(usize, usize),
    #[error("failed to verify rtcp auth tag")]
    RtcpFailedToVerifyAuthTag,
    #[error("invalid cipher key or iv length")]
    ErrInvalidCipherLength,

    //RTCP mux negotiation
    #[error("rtcp mux: cannot disable once active")]
    ErrRtcpMuxCannotDisable,
    #[error("rtcp mux: offer not expected in current state")]
    ErrRtcpMuxUnexpectedOffer,
    #[error("rtcp mux: answer not expected in current state")]
    ErrRtcpMuxUnexpectedAnswer,
    #[error("rtcp mux: answer enables mux that the offer did not")]
    ErrRtcpMuxAnswerWithoutOfferedMux,

    //SDES negotiation
    #[error("srtp: offer not expected in current state")]
    ErrSrtpUnexpectedOffer,
    #[error("srtp: answer not expected in current state")]
    ErrSrtpUnexpectedAnswer,
    #[error("srtp: answer must carry exactly one crypto matching the offer")]
    ErrSrtpInvalidAnswerParams,
    #[error("srtp: unknown crypto suite {0}")]
    ErrSrtpUnknownCryptoSuite(String),
    #[error("srtp: invalid key params")]
    ErrSrtpInvalidKeyParams,
    #[error("srtp: rtp session already active")]
    ErrSrtpAlreadyActive,
    #[error("srtp: rtcp session already active")]
    ErrSrtcpAlreadyActive,
    #[error("srtp: session not active")]
    ErrSrtpNotActive,
    #[error("Cryptos must be empty when DTLS is active.")]
    ErrCryptosWithDtls,
    #[error("Failed to setup SRTP parameters.")]
    ErrSrtpSetupFailed,
    #[error("secure transport required but SRTP is not active")]
    ErrSecureRequiredButInactive,

    //DTLS-SRTP
    #[error("dtls: no selected srtp profile")]
    ErrDtlsNoSelectedSrtpProfile,
    #[error("dtls: srtp key export failed: {0}")]
    ErrDtlsSrtpKeyExport(String),
    #[error("dtls: role unknown")]
    ErrDtlsRoleUnknown,
    #[error("dtls: transport not connected")]
    ErrDtlsNotConnected,

    //Channel
    #[error("channel: no transport bound")]
    ErrNoTransport,
    #[error("channel: transport not writable")]
    ErrTransportNotWritable,
    #[error("channel: failed to create transport: {0}")]
    ErrTransportCreateFailed(String),
    #[error("channel: send would block")]
    ErrWouldBlock,
    #[error("channel: worker stopped")]
    ErrWorkerStopped,
    #[error("channel: media content type mismatch: {0}")]
    ErrContentTypeMismatch(String),
    #[error("Failed to add send stream ssrc: {0}")]
    ErrAddSendStream(u32),
    #[error("Failed to remove send stream with ssrc {0}")]
    ErrRemoveSendStream(u32),
    #[error("Failed to add remote stream ssrc: {0}")]
    ErrAddRecvStream(u32),
    #[error("Failed to remove remote stream with ssrc {0}")]
    ErrRemoveRecvStream(u32),
    #[error("Failed to set local {0} description recv parameters.")]
    ErrSetRecvParameters(String),
    #[error("Failed to set remote {0} description send parameters.")]
    ErrSetSendParameters(String),

    #[error("{0}")]
    Io(#[source] IoError),

    //Other Errors
    #[error("Other SRTP Err: {0}")]
    OtherSrtpErr(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}
