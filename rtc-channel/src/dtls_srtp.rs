use log::{debug, error, info};
use shared::error::{Error, Result};
use srtp::config::Config;

use crate::srtp_filter::SrtpFilter;
use crate::transport::{DtlsRole, DtlsTransportInternal, DtlsTransportState};

/// setup_dtls_srtp exports the DTLS-SRTP keying material of `transport`
/// (RFC 5764 section 4.2) and installs it into `filter`, as the RTP sessions
/// or, for a dedicated RTCP transport, the RTCP sessions.
///
/// Nothing is exported when the sessions already exist, and keying material
/// is only exported once the handshake has completed.
pub fn setup_dtls_srtp(
    transport: &dyn DtlsTransportInternal,
    rtcp: bool,
    filter: &mut SrtpFilter,
) -> Result<()> {
    if (rtcp && filter.has_rtcp_sessions()) || (!rtcp && filter.is_active()) {
        debug!("dtls-srtp keys already installed (rtcp={rtcp})");
        return Ok(());
    }

    let state = transport.dtls_state();
    if state != DtlsTransportState::Connected {
        debug!(
            "dtls-srtp setup deferred on {}: dtls state is {state}",
            transport.transport_name()
        );
        return Err(Error::ErrDtlsNotConnected);
    }

    let profile = transport.selected_srtp_protection_profile().ok_or_else(|| {
        error!("no selected dtls-srtp profile on {}", transport.transport_name());
        Error::ErrDtlsNoSelectedSrtpProfile
    })?;
    info!(
        "installing keys from dtls-srtp on {} {}",
        transport.transport_name(),
        transport.component()
    );

    let role = transport.dtls_role().ok_or_else(|| {
        error!("failed to get the dtls role");
        Error::ErrDtlsRoleUnknown
    })?;

    let mut config = Config {
        profile,
        ..Default::default()
    };
    config.extract_session_keys_from_dtls(transport, role == DtlsRole::Client)?;

    let mut send_key = config.keys.local_master_key.clone();
    send_key.extend_from_slice(&config.keys.local_master_salt);
    let mut recv_key = config.keys.remote_master_key.clone();
    recv_key.extend_from_slice(&config.keys.remote_master_salt);

    let result = if rtcp {
        filter.set_rtcp_params(profile, &send_key, &recv_key)
    } else {
        filter.set_rtp_params(profile, &send_key, &recv_key)
    };
    send_key.fill(0);
    recv_key.fill(0);

    result.map_err(|err| {
        error!("dtls-srtp key installation failed (rtcp={rtcp}): {err}");
        err
    })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::BytesMut;
    use shared::crypto::{DTLS_SRTP_EXPORTER_LABEL, KeyingMaterialExporter};
    use srtp::protection_profile::ProtectionProfile;

    use super::*;
    use crate::transport::*;

    struct FakeDtls {
        state: DtlsTransportState,
        role: Option<DtlsRole>,
        profile: Option<ProtectionProfile>,
        fail_export: bool,
        exports: AtomicUsize,
    }

    impl FakeDtls {
        fn new(role: Option<DtlsRole>) -> Self {
            FakeDtls {
                state: DtlsTransportState::Connected,
                role,
                profile: Some(ProtectionProfile::Aes128CmHmacSha1_80),
                fail_export: false,
                exports: AtomicUsize::new(0),
            }
        }
    }

    impl KeyingMaterialExporter for FakeDtls {
        fn export_keying_material(
            &self,
            label: &str,
            _context: &[u8],
            length: usize,
        ) -> Result<Vec<u8>> {
            self.exports.fetch_add(1, Ordering::SeqCst);
            if self.fail_export || label != DTLS_SRTP_EXPORTER_LABEL {
                return Err(Error::ErrExporterWrongLabel);
            }
            Ok((0..length).map(|i| i as u8).collect())
        }
    }

    impl DtlsTransportInternal for FakeDtls {
        fn transport_name(&self) -> &str {
            "audio"
        }
        fn component(&self) -> Component {
            Component::Rtp
        }
        fn writable(&self) -> bool {
            true
        }
        fn is_dtls_active(&self) -> bool {
            true
        }
        fn dtls_state(&self) -> DtlsTransportState {
            self.state
        }
        fn dtls_role(&self) -> Option<DtlsRole> {
            self.role
        }
        fn selected_srtp_protection_profile(&self) -> Option<ProtectionProfile> {
            self.profile
        }
        fn set_srtp_protection_profiles(&self, _profiles: &[ProtectionProfile]) -> Result<()> {
            Ok(())
        }
        fn send_packet(&self, data: &[u8], _options: &PacketOptions) -> Result<usize> {
            Ok(data.len())
        }
        fn subscribe(&self, _observer: Arc<dyn TransportObserver>) -> TransportSubscription {
            TransportSubscription::empty()
        }
    }

    fn rtp_packet() -> BytesMut {
        BytesMut::from(&[0x80u8, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 9, 1, 2, 3][..])
    }

    #[test]
    fn test_client_and_server_keys_interoperate() -> Result<()> {
        let client = FakeDtls::new(Some(DtlsRole::Client));
        let server = FakeDtls::new(Some(DtlsRole::Server));
        let mut client_filter = SrtpFilter::new(64, 64);
        let mut server_filter = SrtpFilter::new(64, 64);

        setup_dtls_srtp(&client, false, &mut client_filter)?;
        setup_dtls_srtp(&server, false, &mut server_filter)?;
        assert!(client_filter.is_active());

        let pkt = rtp_packet();
        let protected = client_filter.protect_rtp(pkt.clone())?;
        assert_eq!(server_filter.unprotect_rtp(protected)?, pkt);

        let protected = server_filter.protect_rtp(pkt.clone())?;
        assert_eq!(client_filter.unprotect_rtp(protected)?, pkt);
        Ok(())
    }

    #[test]
    fn test_setup_is_idempotent() -> Result<()> {
        let transport = FakeDtls::new(Some(DtlsRole::Server));
        let mut filter = SrtpFilter::new(64, 64);

        setup_dtls_srtp(&transport, false, &mut filter)?;
        setup_dtls_srtp(&transport, false, &mut filter)?;
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);

        setup_dtls_srtp(&transport, true, &mut filter)?;
        setup_dtls_srtp(&transport, true, &mut filter)?;
        assert_eq!(transport.exports.load(Ordering::SeqCst), 2);
        assert!(filter.has_rtcp_sessions());
        Ok(())
    }

    #[test]
    fn test_unknown_role_is_failure() {
        let transport = FakeDtls::new(None);
        let mut filter = SrtpFilter::new(64, 64);

        assert_eq!(
            setup_dtls_srtp(&transport, false, &mut filter),
            Err(Error::ErrDtlsRoleUnknown)
        );
        assert!(!filter.is_active());
        assert_eq!(transport.exports.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handshake_in_progress_exports_nothing() -> Result<()> {
        let mut transport = FakeDtls::new(Some(DtlsRole::Client));
        transport.state = DtlsTransportState::Connecting;
        let mut filter = SrtpFilter::new(64, 64);

        assert_eq!(
            setup_dtls_srtp(&transport, false, &mut filter),
            Err(Error::ErrDtlsNotConnected)
        );
        assert!(!filter.is_active());
        assert_eq!(transport.exports.load(Ordering::SeqCst), 0);

        transport.state = DtlsTransportState::Connected;
        setup_dtls_srtp(&transport, false, &mut filter)?;
        assert!(filter.is_active());
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn test_missing_profile_is_failure() {
        let mut transport = FakeDtls::new(Some(DtlsRole::Client));
        transport.profile = None;
        let mut filter = SrtpFilter::new(64, 64);

        assert_eq!(
            setup_dtls_srtp(&transport, false, &mut filter),
            Err(Error::ErrDtlsNoSelectedSrtpProfile)
        );
        assert!(!filter.is_active());
    }

    #[test]
    fn test_export_failure_installs_nothing() {
        let mut transport = FakeDtls::new(Some(DtlsRole::Client));
        transport.fail_export = true;
        let mut filter = SrtpFilter::new(64, 64);

        let result = setup_dtls_srtp(&transport, false, &mut filter);
        assert!(matches!(result, Err(Error::ErrDtlsSrtpKeyExport(_))));
        assert!(!filter.is_active());
    }
}
