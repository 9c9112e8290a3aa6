use log::{error, info, warn};
use shared::error::{Error, Result};

use super::coordinator::ChannelCore;
use crate::content::ContentAction;
use crate::stream_params::{
    StreamParams, get_stream_by_ids, get_stream_by_ssrc, remove_stream_by_ssrc,
};

impl ChannelCore {
    /// update_local_streams applies the send streams of a local description.
    /// An update adds or removes single streams; any other action carries
    /// the full set.
    pub(super) fn update_local_streams(
        &mut self,
        streams: &[StreamParams],
        action: ContentAction,
    ) -> Result<()> {
        if action == ContentAction::Update {
            for stream in streams {
                let existing = get_stream_by_ids(&self.local_streams, &stream.groupid, &stream.id)
                    .map(|s| s.first_ssrc());
                match existing {
                    None if stream.has_ssrcs() => self.add_send_stream(stream)?,
                    Some(ssrc) if !stream.has_ssrcs() => self.remove_send_stream(ssrc)?,
                    _ => warn!("ignoring unsupported stream update {}/{}", stream.groupid, stream.id),
                }
            }
            return Ok(());
        }

        let mut result = Ok(());
        for removed in self
            .local_streams
            .iter()
            .filter(|s| get_stream_by_ssrc(streams, s.first_ssrc()).is_none())
            .map(|s| s.first_ssrc())
            .collect::<Vec<_>>()
        {
            if let Err(err) = self.media_channel.remove_send_stream(removed) {
                error!("failed to remove send stream {removed}: {err}");
                result = Err(Error::ErrRemoveSendStream(removed));
            }
        }
        for stream in streams {
            if get_stream_by_ssrc(&self.local_streams, stream.first_ssrc()).is_some() {
                continue;
            }
            match self.media_channel.add_send_stream(stream) {
                Ok(()) => info!("added send stream ssrc: {}", stream.first_ssrc()),
                Err(err) => {
                    error!("failed to add send stream {}: {err}", stream.first_ssrc());
                    result = Err(Error::ErrAddSendStream(stream.first_ssrc()));
                }
            }
        }
        self.local_streams = streams.to_vec();
        result
    }

    /// update_remote_streams is update_local_streams for receive streams.
    pub(super) fn update_remote_streams(
        &mut self,
        streams: &[StreamParams],
        action: ContentAction,
    ) -> Result<()> {
        if action == ContentAction::Update {
            for stream in streams {
                let existing = get_stream_by_ids(&self.remote_streams, &stream.groupid, &stream.id)
                    .map(|s| s.first_ssrc());
                match existing {
                    None if stream.has_ssrcs() => self.add_recv_stream(stream)?,
                    Some(ssrc) if !stream.has_ssrcs() => self.remove_recv_stream(ssrc)?,
                    _ => warn!("ignoring unsupported stream update {}/{}", stream.groupid, stream.id),
                }
            }
            return Ok(());
        }

        let mut result = Ok(());
        for removed in self
            .remote_streams
            .iter()
            .filter(|s| get_stream_by_ssrc(streams, s.first_ssrc()).is_none())
            .map(|s| s.first_ssrc())
            .collect::<Vec<_>>()
        {
            if let Err(err) = self.media_channel.remove_recv_stream(removed) {
                error!("failed to remove remote stream {removed}: {err}");
                result = Err(Error::ErrRemoveRecvStream(removed));
            }
        }
        for stream in streams {
            if get_stream_by_ssrc(&self.remote_streams, stream.first_ssrc()).is_some() {
                continue;
            }
            match self.media_channel.add_recv_stream(stream) {
                Ok(()) => info!("added remote stream ssrc: {}", stream.first_ssrc()),
                Err(err) => {
                    error!("failed to add remote stream {}: {err}", stream.first_ssrc());
                    result = Err(Error::ErrAddRecvStream(stream.first_ssrc()));
                }
            }
        }
        self.remote_streams = streams.to_vec();
        self.bundle_filter.set_streams(&self.remote_streams);
        result
    }

    pub(super) fn add_send_stream(&mut self, stream: &StreamParams) -> Result<()> {
        self.media_channel.add_send_stream(stream).map_err(|err| {
            error!("failed to add send stream {}: {err}", stream.first_ssrc());
            Error::ErrAddSendStream(stream.first_ssrc())
        })?;
        info!("added send stream ssrc: {}", stream.first_ssrc());
        self.local_streams.push(stream.clone());
        Ok(())
    }

    pub(super) fn remove_send_stream(&mut self, ssrc: u32) -> Result<()> {
        self.media_channel.remove_send_stream(ssrc).map_err(|err| {
            error!("failed to remove send stream {ssrc}: {err}");
            Error::ErrRemoveSendStream(ssrc)
        })?;
        remove_stream_by_ssrc(&mut self.local_streams, ssrc);
        Ok(())
    }

    pub(super) fn add_recv_stream(&mut self, stream: &StreamParams) -> Result<()> {
        self.media_channel.add_recv_stream(stream).map_err(|err| {
            error!("failed to add remote stream {}: {err}", stream.first_ssrc());
            Error::ErrAddRecvStream(stream.first_ssrc())
        })?;
        info!("added remote stream ssrc: {}", stream.first_ssrc());
        self.remote_streams.push(stream.clone());
        self.bundle_filter.set_streams(&self.remote_streams);
        Ok(())
    }

    pub(super) fn remove_recv_stream(&mut self, ssrc: u32) -> Result<()> {
        self.media_channel.remove_recv_stream(ssrc).map_err(|err| {
            error!("failed to remove remote stream {ssrc}: {err}");
            Error::ErrRemoveRecvStream(ssrc)
        })?;
        remove_stream_by_ssrc(&mut self.remote_streams, ssrc);
        self.bundle_filter.set_streams(&self.remote_streams);
        Ok(())
    }
}
