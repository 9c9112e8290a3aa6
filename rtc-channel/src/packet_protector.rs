use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use bytes::BytesMut;
use log::{debug, trace};
use shared::error::{Error, Result};
use srtp::context::Context;
use srtp::option::{srtcp_replay_protection, srtp_replay_protection};
use srtp::protection_profile::ProtectionProfile;

/// SrtpMessage is one RTP or RTCP packet going through the protector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtpMessage {
    pub now: Instant,
    pub rtcp: bool,
    pub data: BytesMut,
}

impl SrtpMessage {
    pub fn new(rtcp: bool, data: BytesMut) -> Self {
        SrtpMessage {
            now: Instant::now(),
            rtcp,
            data,
        }
    }
}

pub enum SrtpEvent {
    /// A new pair of sessions. `rtcp` selects the dedicated RTCP pair used
    /// when RTCP runs on its own transport.
    SessionsCreated {
        rtcp: bool,
        send: Option<Context>,
        recv: Option<Context>,
    },
    /// Drop every installed session.
    SessionsReset,
}

impl fmt::Debug for SrtpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrtpEvent::SessionsCreated { rtcp, send, recv } => f
                .debug_struct("SessionsCreated")
                .field("rtcp", rtcp)
                .field("send", &send.as_ref().map(|c| c.profile()))
                .field("recv", &recv.as_ref().map(|c| c.profile()))
                .finish(),
            SrtpEvent::SessionsReset => write!(f, "SessionsReset"),
        }
    }
}

/// PacketProtector implements the SRTP/SRTCP transform for one channel with
/// whatever sessions are currently installed.
pub struct PacketProtector {
    send_session: Option<Context>,
    recv_session: Option<Context>,
    send_rtcp_session: Option<Context>,
    recv_rtcp_session: Option<Context>,

    srtp_replay_window: usize,
    srtcp_replay_window: usize,

    read_outs: VecDeque<SrtpMessage>,
    write_outs: VecDeque<SrtpMessage>,
    event_outs: VecDeque<SrtpEvent>,
}

impl PacketProtector {
    pub fn new(srtp_replay_window: usize, srtcp_replay_window: usize) -> Self {
        PacketProtector {
            send_session: None,
            recv_session: None,
            send_rtcp_session: None,
            recv_rtcp_session: None,
            srtp_replay_window,
            srtcp_replay_window,
            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "PacketProtector"
    }

    /// new_sessions builds a send/recv context pair from two key||salt blobs.
    /// Only the receiving side carries replay protection.
    pub fn new_sessions(
        &self,
        profile: ProtectionProfile,
        send_key: &[u8],
        recv_key: &[u8],
    ) -> Result<(Context, Context)> {
        let key_len = profile.key_len();
        if send_key.len() != profile.key_salt_len() || recv_key.len() != profile.key_salt_len() {
            return Err(Error::ErrSrtpInvalidKeyParams);
        }

        let send = Context::new(
            &send_key[..key_len],
            &send_key[key_len..],
            profile,
            None,
            None,
        )?;

        let srtp_opt = (self.srtp_replay_window > 0)
            .then(|| srtp_replay_protection(self.srtp_replay_window));
        let srtcp_opt = (self.srtcp_replay_window > 0)
            .then(|| srtcp_replay_protection(self.srtcp_replay_window));
        let recv = Context::new(
            &recv_key[..key_len],
            &recv_key[key_len..],
            profile,
            srtp_opt,
            srtcp_opt,
        )?;

        Ok((send, recv))
    }

    pub fn has_rtp_sessions(&self) -> bool {
        self.send_session.is_some() && self.recv_session.is_some()
    }

    pub fn has_rtcp_sessions(&self) -> bool {
        self.send_rtcp_session.is_some() && self.recv_rtcp_session.is_some()
    }

    pub fn profile(&self) -> Option<ProtectionProfile> {
        self.send_session.as_ref().map(|c| c.profile())
    }

    pub fn rtp_overhead(&self) -> usize {
        self.profile().map(|p| p.rtp_overhead()).unwrap_or(0)
    }

    fn send_context(&mut self, rtcp: bool) -> Option<&mut Context> {
        if rtcp && self.send_rtcp_session.is_some() {
            self.send_rtcp_session.as_mut()
        } else {
            self.send_session.as_mut()
        }
    }

    fn recv_context(&mut self, rtcp: bool) -> Option<&mut Context> {
        if rtcp && self.recv_rtcp_session.is_some() {
            self.recv_rtcp_session.as_mut()
        } else {
            self.recv_session.as_mut()
        }
    }
}

impl sansio::Protocol<SrtpMessage, SrtpMessage, SrtpEvent> for PacketProtector {
    type Rout = SrtpMessage;
    type Wout = SrtpMessage;
    type Eout = SrtpEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: SrtpMessage) -> Result<()> {
        let context = self
            .recv_context(msg.rtcp)
            .ok_or(Error::ErrSrtpNotActive)?;

        let decrypted = if msg.rtcp {
            context.decrypt_rtcp(&msg.data)?
        } else {
            context.decrypt_rtp(&msg.data)?
        };
        trace!("unprotected {} bytes (rtcp={})", decrypted.len(), msg.rtcp);

        self.read_outs.push_back(SrtpMessage {
            now: msg.now,
            rtcp: msg.rtcp,
            data: decrypted,
        });
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: SrtpMessage) -> Result<()> {
        let context = self
            .send_context(msg.rtcp)
            .ok_or(Error::ErrSrtpNotActive)?;

        let encrypted = if msg.rtcp {
            context.encrypt_rtcp(&msg.data)?
        } else {
            context.encrypt_rtp(&msg.data)?
        };
        trace!("protected {} bytes (rtcp={})", encrypted.len(), msg.rtcp);

        self.write_outs.push_back(SrtpMessage {
            now: msg.now,
            rtcp: msg.rtcp,
            data: encrypted,
        });
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, mut evt: SrtpEvent) -> Result<()> {
        match &mut evt {
            SrtpEvent::SessionsCreated { rtcp, send, recv } => {
                debug!("srtp sessions created (rtcp={rtcp})");
                if *rtcp {
                    self.send_rtcp_session = send.take();
                    self.recv_rtcp_session = recv.take();
                } else {
                    self.send_session = send.take();
                    self.recv_session = recv.take();
                }
            }
            SrtpEvent::SessionsReset => {
                debug!("srtp sessions reset");
                self.send_session = None;
                self.recv_session = None;
                self.send_rtcp_session = None;
                self.recv_rtcp_session = None;
            }
        }

        self.event_outs.push_back(evt);

        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        None
    }

    fn close(&mut self) -> Result<()> {
        self.read_outs.clear();
        self.write_outs.clear();
        self.event_outs.clear();
        Ok(())
    }
}
