use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto_params::CryptoParams;
use crate::stream_params::StreamParams;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// ContentAction is the stage of the offer/answer exchange a content
/// description is applied at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentAction {
    Offer,
    ProvisionalAnswer,
    Answer,
    /// Stream membership changes outside of an offer/answer exchange.
    Update,
}

impl ContentAction {
    pub fn is_answer(&self) -> bool {
        matches!(self, ContentAction::ProvisionalAnswer | ContentAction::Answer)
    }
}

impl fmt::Display for ContentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ContentAction::Offer => "offer",
            ContentAction::ProvisionalAnswer => "pranswer",
            ContentAction::Answer => "answer",
            ContentAction::Update => "update",
        };
        write!(f, "{s}")
    }
}

/// ContentSource tells whether a description was generated locally or
/// received from the remote peer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Local,
    Remote,
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ContentSource::Local => write!(f, "local"),
            ContentSource::Remote => write!(f, "remote"),
        }
    }
}

/// MediaType is the kind of media carried by a channel.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Unspecified,
    Audio,
    Video,
    Data,
}

const MEDIA_TYPE_AUDIO_STR: &str = "audio";
const MEDIA_TYPE_VIDEO_STR: &str = "video";
const MEDIA_TYPE_DATA_STR: &str = "data";

impl From<&str> for MediaType {
    fn from(raw: &str) -> Self {
        match raw {
            MEDIA_TYPE_AUDIO_STR => MediaType::Audio,
            MEDIA_TYPE_VIDEO_STR => MediaType::Video,
            MEDIA_TYPE_DATA_STR => MediaType::Data,
            _ => MediaType::Unspecified,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaType::Audio => MEDIA_TYPE_AUDIO_STR,
            MediaType::Video => MEDIA_TYPE_VIDEO_STR,
            MediaType::Data => MEDIA_TYPE_DATA_STR,
            MediaType::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// MediaContentDirection is the a=sendrecv family of attributes.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaContentDirection {
    #[default]
    Sendrecv,
    Sendonly,
    Recvonly,
    Inactive,
}

impl MediaContentDirection {
    pub fn has_send(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Sendonly)
    }

    pub fn has_recv(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Recvonly)
    }
}

impl fmt::Display for MediaContentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaContentDirection::Sendrecv => "sendrecv",
            MediaContentDirection::Sendonly => "sendonly",
            MediaContentDirection::Recvonly => "recvonly",
            MediaContentDirection::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

/// Codec is one negotiated payload format of an m= section.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub payload_type: u8,
    pub name: String,
    pub clock_rate: u32,
}

impl Codec {
    pub fn new(payload_type: u8, name: &str, clock_rate: u32) -> Self {
        Codec {
            payload_type,
            name: name.to_owned(),
            clock_rate,
        }
    }
}

/// MediaContentDescription is the already-parsed part of an m= section this
/// layer acts upon.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct MediaContentDescription {
    pub media_type: MediaType,
    pub codecs: Vec<Codec>,
    pub cryptos: Vec<CryptoParams>,
    pub rtcp_mux: bool,
    pub streams: Vec<StreamParams>,
    pub direction: MediaContentDirection,
    /// Set locally when the session must not fall back to plain RTP.
    pub crypto_required: bool,
}

impl MediaContentDescription {
    pub fn new(media_type: MediaType) -> Self {
        MediaContentDescription {
            media_type,
            ..Default::default()
        }
    }
}
