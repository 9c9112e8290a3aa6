use shared::replay_detector::*;

pub type ContextOption = Box<dyn (Fn() -> Box<dyn ReplayDetector + Send + 'static>) + Send + Sync>;

/// The SRTP packet index is 48 bits: rollover counter and sequence number.
pub(crate) const MAX_SRTP_INDEX: u64 = (1 << 48) - 1;
pub(crate) const MAX_SRTCP_INDEX: u64 = 0x7FFF_FFFF;

/// srtp_replay_protection sets SRTP replay protection window size.
pub fn srtp_replay_protection(window_size: usize) -> ContextOption {
    Box::new(move || -> Box<dyn ReplayDetector + Send + 'static> {
        Box::new(SlidingWindowDetector::new(window_size, MAX_SRTP_INDEX))
    })
}

/// Sets SRTCP replay protection window size.
pub fn srtcp_replay_protection(window_size: usize) -> ContextOption {
    Box::new(move || -> Box<dyn ReplayDetector + Send + 'static> {
        Box::new(SlidingWindowDetector::new(window_size, MAX_SRTCP_INDEX))
    })
}

/// srtp_no_replay_protection disables SRTP replay protection.
pub fn srtp_no_replay_protection() -> ContextOption {
    Box::new(|| -> Box<dyn ReplayDetector + Send + 'static> {
        Box::<NoOpReplayDetector>::default()
    })
}

/// srtcp_no_replay_protection disables SRTCP replay protection.
pub fn srtcp_no_replay_protection() -> ContextOption {
    Box::new(|| -> Box<dyn ReplayDetector + Send + 'static> {
        Box::<NoOpReplayDetector>::default()
    })
}
