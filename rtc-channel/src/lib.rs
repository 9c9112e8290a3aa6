#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod bundle_filter;
pub mod channel;
pub mod config;
pub mod content;
pub mod crypto_params;
pub mod dtls_srtp;
pub mod media_channel;
pub mod packet_protector;
pub mod rtcp_mux_filter;
pub mod rtp_utils;
pub mod srtp_filter;
pub mod stream_params;
pub mod transport;
pub mod transport_binding;
pub mod worker;

pub use shared::error::{Error, Result};
