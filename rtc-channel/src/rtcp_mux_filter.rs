use log::debug;
use shared::error::{Error, Result};
use shared::util::is_rtcp_mux_packet;

use crate::content::ContentSource;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtcpMuxState {
    #[default]
    Init,
    SentOffer,
    ReceivedOffer,
    SentProvisionalAnswer,
    ReceivedProvisionalAnswer,
    /// Terminal, mux can no longer be turned off.
    Active,
}

/// RtcpMuxFilter tracks the offer/answer negotiation of a=rtcp-mux and
/// classifies packets arriving on the RTP transport.
#[derive(Default, Debug)]
pub struct RtcpMuxFilter {
    state: RtcpMuxState,
    offer_enable: bool,
}

impl RtcpMuxFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RtcpMuxState {
        self.state
    }

    /// is_active is true once both sides agreed on mux, provisionally or not.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            RtcpMuxState::SentProvisionalAnswer
                | RtcpMuxState::ReceivedProvisionalAnswer
                | RtcpMuxState::Active
        )
    }

    /// is_fully_active is true only after a final answer or set_active.
    pub fn is_fully_active(&self) -> bool {
        self.state == RtcpMuxState::Active
    }

    /// set_active forces mux on regardless of negotiation.
    pub fn set_active(&mut self) {
        self.state = RtcpMuxState::Active;
    }

    pub fn set_offer(&mut self, offer_enable: bool, source: ContentSource) -> Result<()> {
        if self.state == RtcpMuxState::Active {
            return if offer_enable {
                Ok(())
            } else {
                Err(Error::ErrRtcpMuxCannotDisable)
            };
        }

        if !self.expect_offer(source) {
            return Err(Error::ErrRtcpMuxUnexpectedOffer);
        }

        self.offer_enable = offer_enable;
        self.state = match source {
            ContentSource::Local => RtcpMuxState::SentOffer,
            ContentSource::Remote => RtcpMuxState::ReceivedOffer,
        };
        debug!("rtcp mux offer({offer_enable}) from {source} -> {:?}", self.state);
        Ok(())
    }

    pub fn set_provisional_answer(&mut self, answer_enable: bool, source: ContentSource) -> Result<()> {
        if self.state == RtcpMuxState::Active {
            return if answer_enable {
                Ok(())
            } else {
                Err(Error::ErrRtcpMuxCannotDisable)
            };
        }

        if !self.expect_answer(source) {
            return Err(Error::ErrRtcpMuxUnexpectedAnswer);
        }

        if self.offer_enable {
            self.state = match (answer_enable, source) {
                (true, ContentSource::Remote) => RtcpMuxState::ReceivedProvisionalAnswer,
                (true, ContentSource::Local) => RtcpMuxState::SentProvisionalAnswer,
                // The answerer does not want mux (yet). Go back to the
                // post-offer state and wait for the next answer.
                (false, ContentSource::Remote) => RtcpMuxState::SentOffer,
                (false, ContentSource::Local) => RtcpMuxState::ReceivedOffer,
            };
        } else if answer_enable {
            return Err(Error::ErrRtcpMuxAnswerWithoutOfferedMux);
        }

        debug!("rtcp mux pranswer({answer_enable}) from {source} -> {:?}", self.state);
        Ok(())
    }

    pub fn set_answer(&mut self, answer_enable: bool, source: ContentSource) -> Result<()> {
        if self.state == RtcpMuxState::Active {
            return if answer_enable {
                Ok(())
            } else {
                Err(Error::ErrRtcpMuxCannotDisable)
            };
        }

        if !self.expect_answer(source) {
            return Err(Error::ErrRtcpMuxUnexpectedAnswer);
        }

        if self.offer_enable && answer_enable {
            self.state = RtcpMuxState::Active;
        } else if answer_enable {
            return Err(Error::ErrRtcpMuxAnswerWithoutOfferedMux);
        } else {
            self.state = RtcpMuxState::Init;
        }

        debug!("rtcp mux answer({answer_enable}) from {source} -> {:?}", self.state);
        Ok(())
    }

    /// demux_rtcp tells whether a packet read from the RTP transport is RTCP.
    /// Muxed RTCP can arrive before the answer once we offered mux.
    pub fn demux_rtcp(&self, buf: &[u8]) -> bool {
        if !self.is_active() && !(self.state == RtcpMuxState::SentOffer && self.offer_enable) {
            return false;
        }

        is_rtcp_mux_packet(buf)
    }

    fn expect_offer(&self, source: ContentSource) -> bool {
        match self.state {
            RtcpMuxState::Init => true,
            RtcpMuxState::SentOffer => source == ContentSource::Local,
            RtcpMuxState::ReceivedOffer => source == ContentSource::Remote,
            _ => false,
        }
    }

    fn expect_answer(&self, source: ContentSource) -> bool {
        matches!(
            (self.state, source),
            (RtcpMuxState::SentOffer, ContentSource::Remote)
                | (RtcpMuxState::ReceivedOffer, ContentSource::Local)
                | (RtcpMuxState::SentProvisionalAnswer, ContentSource::Local)
                | (RtcpMuxState::ReceivedProvisionalAnswer, ContentSource::Remote)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ContentSource::*;

    const RTCP_SR: [u8; 4] = [0x80, 0xc8, 0x00, 0x06];
    const RTP: [u8; 4] = [0x80, 0x60, 0x00, 0x01];

    #[test]
    fn test_offer_answer_activates() -> Result<()> {
        for (offer_source, answer_source) in [(Local, Remote), (Remote, Local)] {
            let mut filter = RtcpMuxFilter::new();
            filter.set_offer(true, offer_source)?;
            assert!(!filter.is_active());
            filter.set_answer(true, answer_source)?;
            assert!(filter.is_active());
            assert!(filter.is_fully_active());

            // Once active, re-offering or re-answering with mux is a no-op.
            filter.set_offer(true, Local)?;
            filter.set_answer(true, Remote)?;
            filter.set_provisional_answer(true, Local)?;
            assert_eq!(filter.state(), RtcpMuxState::Active);
        }

        Ok(())
    }

    #[test]
    fn test_cannot_disable_once_active() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(true, Local)?;
        filter.set_answer(true, Remote)?;

        assert_eq!(filter.set_offer(false, Local), Err(Error::ErrRtcpMuxCannotDisable));
        assert_eq!(filter.set_answer(false, Remote), Err(Error::ErrRtcpMuxCannotDisable));
        assert_eq!(
            filter.set_provisional_answer(false, Remote),
            Err(Error::ErrRtcpMuxCannotDisable)
        );
        assert!(filter.is_active());

        Ok(())
    }

    #[test]
    fn test_answer_without_offer_fails() {
        let mut filter = RtcpMuxFilter::new();
        assert_eq!(filter.set_answer(true, Remote), Err(Error::ErrRtcpMuxUnexpectedAnswer));
        assert_eq!(filter.state(), RtcpMuxState::Init);
        assert_eq!(
            filter.set_provisional_answer(true, Local),
            Err(Error::ErrRtcpMuxUnexpectedAnswer)
        );
        assert_eq!(filter.state(), RtcpMuxState::Init);
    }

    #[test]
    fn test_answer_from_wrong_source_fails() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(true, Local)?;
        assert_eq!(filter.set_answer(true, Local), Err(Error::ErrRtcpMuxUnexpectedAnswer));
        assert_eq!(filter.set_offer(true, Remote), Err(Error::ErrRtcpMuxUnexpectedOffer));
        assert_eq!(filter.state(), RtcpMuxState::SentOffer);
        Ok(())
    }

    #[test]
    fn test_answer_disables_mux() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(true, Remote)?;
        filter.set_answer(false, Local)?;
        assert_eq!(filter.state(), RtcpMuxState::Init);
        assert!(!filter.is_active());
        Ok(())
    }

    #[test]
    fn test_answer_enables_unoffered_mux_fails() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(false, Local)?;
        assert_eq!(
            filter.set_answer(true, Remote),
            Err(Error::ErrRtcpMuxAnswerWithoutOfferedMux)
        );
        assert_eq!(
            filter.set_provisional_answer(true, Remote),
            Err(Error::ErrRtcpMuxAnswerWithoutOfferedMux)
        );
        assert_eq!(filter.state(), RtcpMuxState::SentOffer);
        Ok(())
    }

    #[test]
    fn test_provisional_answer() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(true, Local)?;
        filter.set_provisional_answer(true, Remote)?;
        assert_eq!(filter.state(), RtcpMuxState::ReceivedProvisionalAnswer);
        assert!(filter.is_active());
        assert!(!filter.is_fully_active());

        filter.set_provisional_answer(true, Remote)?;
        filter.set_answer(true, Remote)?;
        assert!(filter.is_fully_active());
        Ok(())
    }

    #[test]
    fn test_provisional_answer_disagreement_reverts_to_offer_state() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(true, Remote)?;
        filter.set_provisional_answer(true, Local)?;
        assert_eq!(filter.state(), RtcpMuxState::SentProvisionalAnswer);

        // A later pranswer without mux goes back to the post-offer state,
        // not to Init, so a final answer can still enable mux.
        filter.set_provisional_answer(false, Local)?;
        assert_eq!(filter.state(), RtcpMuxState::ReceivedOffer);
        assert!(!filter.is_active());

        filter.set_answer(true, Local)?;
        assert!(filter.is_fully_active());
        Ok(())
    }

    #[test]
    fn test_demux_rtcp() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        assert!(!filter.demux_rtcp(&RTCP_SR));

        // Early muxed RTCP after offering mux.
        filter.set_offer(true, Local)?;
        assert!(filter.demux_rtcp(&RTCP_SR));
        assert!(!filter.demux_rtcp(&RTP));
        assert!(!filter.demux_rtcp(&RTCP_SR[..1]));

        filter.set_answer(true, Remote)?;
        assert!(filter.demux_rtcp(&RTCP_SR));
        assert!(!filter.demux_rtcp(&RTP));
        assert!(!filter.demux_rtcp(&[]));
        assert!(!filter.demux_rtcp(&[0x80]));
        Ok(())
    }

    #[test]
    fn test_demux_rtcp_received_offer() -> Result<()> {
        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(true, Remote)?;
        assert!(!filter.demux_rtcp(&RTCP_SR));

        let mut filter = RtcpMuxFilter::new();
        filter.set_offer(false, Local)?;
        assert!(!filter.demux_rtcp(&RTCP_SR));
        Ok(())
    }

    #[test]
    fn test_set_active() {
        let mut filter = RtcpMuxFilter::new();
        filter.set_active();
        assert!(filter.is_fully_active());
        assert_eq!(filter.set_offer(false, Local), Err(Error::ErrRtcpMuxCannotDisable));
    }
}
