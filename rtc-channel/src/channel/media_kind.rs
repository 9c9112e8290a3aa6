use std::fmt;

use log::error;
use shared::error::{Error, Result};

use crate::content::{MediaContentDescription, MediaType};
use crate::media_channel::MediaChannel;

/// MediaKind selects the per-media behaviour of a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Voice,
    Video,
    Data,
}

impl MediaKind {
    pub fn media_type(&self) -> MediaType {
        match *self {
            MediaKind::Voice => MediaType::Audio,
            MediaKind::Video => MediaType::Video,
            MediaKind::Data => MediaType::Data,
        }
    }

    /// check_content rejects descriptions of another media type.
    pub(crate) fn check_content(&self, content: &MediaContentDescription) -> Result<()> {
        if content.media_type != self.media_type() {
            return Err(Error::ErrContentTypeMismatch(format!(
                "{} channel got {} content",
                self, content.media_type
            )));
        }
        Ok(())
    }

    /// change_state pushes the receive and send state to the media channel.
    /// Video has no playout switch.
    pub(crate) fn change_state(&self, media_channel: &mut dyn MediaChannel, recv: bool, send: bool) {
        match *self {
            MediaKind::Voice | MediaKind::Data => {
                if let Err(err) = media_channel.set_playout(recv) {
                    error!("failed to set {self} playout to {recv}: {err}");
                }
            }
            MediaKind::Video => {}
        }
        if let Err(err) = media_channel.set_send(send) {
            error!("failed to set {self} send to {send}: {err}");
        }
    }
}

impl TryFrom<MediaType> for MediaKind {
    type Error = Error;

    fn try_from(media_type: MediaType) -> Result<Self> {
        match media_type {
            MediaType::Audio => Ok(MediaKind::Voice),
            MediaType::Video => Ok(MediaKind::Video),
            MediaType::Data => Ok(MediaKind::Data),
            MediaType::Unspecified => Err(Error::ErrContentTypeMismatch(
                "channel media type unspecified".to_owned(),
            )),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaKind::Voice => "audio",
            MediaKind::Video => "video",
            MediaKind::Data => "data",
        };
        write!(f, "{s}")
    }
}
