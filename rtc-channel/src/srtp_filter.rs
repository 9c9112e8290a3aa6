
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use sansio::Protocol;
use shared::error::{Error, Result};
use srtp::protection_profile::ProtectionProfile;

use crate::content::ContentSource;
use crate::crypto_params::{CryptoParams, parse_key_params};
use crate::packet_protector::{PacketProtector, SrtpEvent, SrtpMessage};

/// SrtpState orders the SDES negotiation states. Every state from Active
/// onwards has SRTP sessions installed.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SrtpState {
    #[default]
    Init,
    SentOffer,
    ReceivedOffer,
    SentProvisionalAnswerNoCrypto,
    ReceivedProvisionalAnswerNoCrypto,
    Active,
    SentUpdatedOffer,
    ReceivedUpdatedOffer,
    SentProvisionalAnswer,
    ReceivedProvisionalAnswer,
}

/// SrtpFilter negotiates SDES crypto parameters and owns the resulting
/// packet protection. DTLS-SRTP installs its keys through set_rtp_params
/// and set_rtcp_params instead of the offer/answer calls.
pub struct SrtpFilter {
    state: SrtpState,
    offer_params: Vec<CryptoParams>,
    applied_send_params: Option<CryptoParams>,
    applied_recv_params: Option<CryptoParams>,
    protector: PacketProtector,
}

impl SrtpFilter {
    pub fn new(srtp_replay_window: usize, srtcp_replay_window: usize) -> Self {
        SrtpFilter {
            state: SrtpState::Init,
            offer_params: vec![],
            applied_send_params: None,
            applied_recv_params: None,
            protector: PacketProtector::new(srtp_replay_window, srtcp_replay_window),
        }
    }

    pub fn state(&self) -> SrtpState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state >= SrtpState::Active
    }

    pub fn has_rtcp_sessions(&self) -> bool {
        self.protector.has_rtcp_sessions()
    }

    pub fn profile(&self) -> Option<ProtectionProfile> {
        self.protector.profile()
    }

    pub fn set_offer(&mut self, offer_params: &[CryptoParams], source: ContentSource) -> Result<()> {
        if !self.expect_offer(source) {
            warn!("wrong state {:?} to update srtp offer from {source}", self.state);
            return Err(Error::ErrSrtpUnexpectedOffer);
        }
        self.store_params(offer_params, source);
        Ok(())
    }

    pub fn set_provisional_answer(
        &mut self,
        answer_params: &[CryptoParams],
        source: ContentSource,
    ) -> Result<()> {
        self.do_set_answer(answer_params, source, false)
    }

    pub fn set_answer(&mut self, answer_params: &[CryptoParams], source: ContentSource) -> Result<()> {
        self.do_set_answer(answer_params, source, true)
    }

    /// set_rtp_params installs keys obtained out of band, i.e. from DTLS.
    /// Keys are key||salt blobs for `profile`.
    pub fn set_rtp_params(
        &mut self,
        profile: ProtectionProfile,
        send_key: &[u8],
        recv_key: &[u8],
    ) -> Result<()> {
        if self.is_active() {
            warn!("tried to set srtp params when filter already active");
            return Err(Error::ErrSrtpAlreadyActive);
        }
        self.create_sessions(profile, send_key, recv_key, false)?;
        self.state = SrtpState::Active;

        info!("srtp activated with negotiated parameters: profile={profile}");
        Ok(())
    }

    /// update_rtp_params replaces the keys of an already active filter.
    pub fn update_rtp_params(
        &mut self,
        profile: ProtectionProfile,
        send_key: &[u8],
        recv_key: &[u8],
    ) -> Result<()> {
        if !self.is_active() {
            warn!("tried to update srtp params when filter not active");
            return Err(Error::ErrSrtpNotActive);
        }
        self.create_sessions(profile, send_key, recv_key, false)?;

        info!("srtp updated with negotiated parameters: profile={profile}");
        Ok(())
    }

    /// set_rtcp_params installs the keys for a dedicated RTCP transport.
    /// This can only happen once per negotiation.
    pub fn set_rtcp_params(
        &mut self,
        profile: ProtectionProfile,
        send_key: &[u8],
        recv_key: &[u8],
    ) -> Result<()> {
        if self.protector.has_rtcp_sessions() {
            warn!("tried to set srtcp params when filter already active");
            return Err(Error::ErrSrtcpAlreadyActive);
        }
        self.create_sessions(profile, send_key, recv_key, true)?;

        info!("srtcp activated with negotiated parameters: profile={profile}");
        Ok(())
    }

    /// reset_params drops all sessions and negotiation state.
    pub fn reset_params(&mut self) {
        self.offer_params.clear();
        self.applied_send_params = None;
        self.applied_recv_params = None;
        self.state = SrtpState::Init;
        if let Err(err) = self.protector.handle_event(SrtpEvent::SessionsReset) {
            warn!("failed to reset srtp sessions: {err}");
        }
        self.drain_events();
        info!("srtp reset to init state");
    }

    pub fn protect_rtp(&mut self, data: BytesMut) -> Result<BytesMut> {
        self.protect(false, data)
    }

    pub fn protect_rtcp(&mut self, data: BytesMut) -> Result<BytesMut> {
        self.protect(true, data)
    }

    pub fn unprotect_rtp(&mut self, data: BytesMut) -> Result<BytesMut> {
        self.unprotect(false, data)
    }

    pub fn unprotect_rtcp(&mut self, data: BytesMut) -> Result<BytesMut> {
        self.unprotect(true, data)
    }

    fn protect(&mut self, rtcp: bool, data: BytesMut) -> Result<BytesMut> {
        if !self.is_active() {
            warn!("failed to protect: srtp not active");
            return Err(Error::ErrSrtpNotActive);
        }
        self.protector.handle_write(SrtpMessage::new(rtcp, data))?;
        self.protector
            .poll_write()
            .map(|msg| msg.data)
            .ok_or(Error::ErrSrtpNotActive)
    }

    fn unprotect(&mut self, rtcp: bool, data: BytesMut) -> Result<BytesMut> {
        if !self.is_active() {
            warn!("failed to unprotect: srtp not active");
            return Err(Error::ErrSrtpNotActive);
        }
        self.protector.handle_read(SrtpMessage::new(rtcp, data))?;
        self.protector
            .poll_read()
            .map(|msg| msg.data)
            .ok_or(Error::ErrSrtpNotActive)
    }

    fn expect_offer(&self, source: ContentSource) -> bool {
        match self.state {
            SrtpState::Init | SrtpState::Active => true,
            SrtpState::SentOffer | SrtpState::SentUpdatedOffer => source == ContentSource::Local,
            SrtpState::ReceivedOffer | SrtpState::ReceivedUpdatedOffer => {
                source == ContentSource::Remote
            }
            _ => false,
        }
    }

    fn store_params(&mut self, params: &[CryptoParams], source: ContentSource) {
        self.offer_params = params.to_vec();
        self.state = match (self.state, source) {
            (SrtpState::Init, ContentSource::Local) => SrtpState::SentOffer,
            (SrtpState::Init, ContentSource::Remote) => SrtpState::ReceivedOffer,
            (SrtpState::Active, ContentSource::Local) => SrtpState::SentUpdatedOffer,
            (SrtpState::Active, ContentSource::Remote) => SrtpState::ReceivedUpdatedOffer,
            (state, _) => state,
        };
        debug!("srtp offer stored from {source}, state {:?}", self.state);
    }

    fn expect_answer(&self, source: ContentSource) -> bool {
        use ContentSource::*;
        use SrtpState::*;

        matches!(
            (self.state, source),
            (SentOffer, Remote)
                | (ReceivedOffer, Local)
                | (SentUpdatedOffer, Remote)
                | (ReceivedUpdatedOffer, Local)
                | (SentProvisionalAnswerNoCrypto, Local)
                | (SentProvisionalAnswer, Local)
                | (ReceivedProvisionalAnswerNoCrypto, Remote)
                | (ReceivedProvisionalAnswer, Remote)
        )
    }

    fn do_set_answer(
        &mut self,
        answer_params: &[CryptoParams],
        source: ContentSource,
        final_answer: bool,
    ) -> Result<()> {
        if !self.expect_answer(source) {
            warn!("invalid state {:?} for srtp answer from {source}", self.state);
            return Err(Error::ErrSrtpUnexpectedAnswer);
        }

        // If the answer doesn't requests crypto complete the negotiation of
        // an unencrypted session. Otherwise finalize the parameters.
        if answer_params.is_empty() {
            if final_answer {
                self.reset_params();
            } else {
                self.state = match source {
                    ContentSource::Local => SrtpState::SentProvisionalAnswerNoCrypto,
                    ContentSource::Remote => SrtpState::ReceivedProvisionalAnswerNoCrypto,
                };
            }
            return Ok(());
        }

        let selected = self.negotiate_params(answer_params)?;
        let (send_params, recv_params) = match source {
            ContentSource::Remote => (selected, answer_params[0].clone()),
            ContentSource::Local => (answer_params[0].clone(), selected),
        };
        self.apply_params(&send_params, &recv_params)?;

        if final_answer {
            self.offer_params.clear();
            self.state = SrtpState::Active;
        } else {
            self.state = match source {
                ContentSource::Local => SrtpState::SentProvisionalAnswer,
                ContentSource::Remote => SrtpState::ReceivedProvisionalAnswer,
            };
        }
        debug!("srtp answer applied from {source}, state {:?}", self.state);
        Ok(())
    }

    /// negotiate_params picks the offered crypto that the single answered
    /// crypto refers to.
    fn negotiate_params(&self, answer_params: &[CryptoParams]) -> Result<CryptoParams> {
        if answer_params.len() != 1 || self.offer_params.is_empty() {
            warn!(
                "invalid srtp answer: {} answer params, {} offer params",
                answer_params.len(),
                self.offer_params.len()
            );
            return Err(Error::ErrSrtpInvalidAnswerParams);
        }

        self.offer_params
            .iter()
            .find(|offered| offered.matches(&answer_params[0]))
            .cloned()
            .ok_or_else(|| {
                warn!("invalid srtp answer: no offer matches tag {}", answer_params[0].tag);
                Error::ErrSrtpInvalidAnswerParams
            })
    }

    fn apply_params(&mut self, send_params: &CryptoParams, recv_params: &CryptoParams) -> Result<()> {
        let unchanged = |applied: &Option<CryptoParams>, params: &CryptoParams| {
            applied.as_ref().is_some_and(|applied| {
                applied.cipher_suite == params.cipher_suite && applied.key_params == params.key_params
            })
        };
        if unchanged(&self.applied_send_params, send_params)
            && unchanged(&self.applied_recv_params, recv_params)
        {
            trace!("applying the same srtp parameters again, keeping sessions");
            return Ok(());
        }

        let send_profile = send_params.profile()?;
        let recv_profile = recv_params.profile()?;
        if send_profile != recv_profile {
            return Err(Error::ErrSrtpInvalidAnswerParams);
        }

        let mut send_key = parse_key_params(&send_params.key_params, send_profile.key_salt_len())?;
        let mut recv_key = parse_key_params(&recv_params.key_params, recv_profile.key_salt_len())?;

        let result = self.create_sessions(send_profile, &send_key, &recv_key, false);
        send_key.fill(0);
        recv_key.fill(0);
        result?;

        self.applied_send_params = Some(send_params.clone());
        self.applied_recv_params = Some(recv_params.clone());
        info!("srtp activated with negotiated parameters: send cipher_suite {}", send_params.cipher_suite);
        Ok(())
    }

    fn create_sessions(
        &mut self,
        profile: ProtectionProfile,
        send_key: &[u8],
        recv_key: &[u8],
        rtcp: bool,
    ) -> Result<()> {
        let (send, recv) = self.protector.new_sessions(profile, send_key, recv_key)?;
        self.protector.handle_event(SrtpEvent::SessionsCreated {
            rtcp,
            send: Some(send),
            recv: Some(recv),
        })?;
        self.drain_events();
        Ok(())
    }

    fn drain_events(&mut self) {
        while let Some(evt) = self.protector.poll_event() {
            trace!("srtp filter: {evt:?}");
        }
    }
}
