use crate::error::Result;

/// RFC 5764 section 4.2 exporter label for DTLS-SRTP keying material.
pub const DTLS_SRTP_EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";

/// KeyingMaterialExporter to extract keying material from a completed
/// DTLS handshake.
///
/// This trait sits here so the srtp crate and the channel layer can derive
/// keys without depending on a concrete DTLS implementation.
pub trait KeyingMaterialExporter {
    /// Exports `length` bytes per RFC 5705. An empty `context` means the
    /// exporter is called without a context value.
    fn export_keying_material(&self, label: &str, context: &[u8], length: usize)
    -> Result<Vec<u8>>;
}
