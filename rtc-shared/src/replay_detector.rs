/// ReplayDetector is the interface of sequence replay detector.
pub trait ReplayDetector {
    /// Check returns true if given sequence number is not replayed.
    /// Call accept() to mark the packet is received properly.
    fn check(&mut self, seq: u64) -> bool;
    fn accept(&mut self);
}

/// FixedBigInt is the fix-sized multi-word integer used as the sliding
/// window bitmap.
#[derive(Debug, Clone)]
struct FixedBigInt {
    bits: Vec<u64>,
    n: usize,
}

impl FixedBigInt {
    fn new(n: usize) -> Self {
        let mut chunk_size = n.div_ceil(64);
        if chunk_size == 0 {
            chunk_size = 1;
        }

        FixedBigInt {
            bits: vec![0; chunk_size],
            n,
        }
    }

    // lsh is the left shift operation.
    fn lsh(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let n_chunk = n / 64;
        let n_n = n % 64;

        let len = self.bits.len();
        let mut shifted = vec![0u64; len];
        for (i, out) in shifted.iter_mut().enumerate() {
            if i < n_chunk {
                continue;
            }
            let src = i - n_chunk;
            *out |= self.bits[src] << n_n;
            if n_n > 0 && src >= 1 {
                *out |= self.bits[src - 1] >> (64 - n_n);
            }
        }
        self.bits = shifted;

        let last = len - 1;
        if self.n % 64 != 0 {
            self.bits[last] &= (1 << (self.n % 64)) - 1;
        }
    }

    // bit returns i-th bit of the fixedBigInt.
    fn bit(&self, i: usize) -> usize {
        if i >= self.n {
            return 0;
        }
        let chunk = i / 64;
        let pos = i % 64;
        usize::from(self.bits[chunk] & (1 << pos) != 0)
    }

    // set_bit sets i-th bit to 1.
    fn set_bit(&mut self, i: usize) {
        if i >= self.n {
            return;
        }
        let chunk = i / 64;
        let pos = i % 64;
        self.bits[chunk] |= 1 << pos;
    }
}

/// SlidingWindowDetector is the implementation of ReplayDetector
/// for monotonically increasing indices (the 48-bit SRTP packet index, the
/// 31-bit SRTCP index).
#[derive(Debug, Clone)]
pub struct SlidingWindowDetector {
    accepted: bool,
    seq: u64,
    latest_seq: u64,
    max_seq: u64,
    window_size: usize,
    mask: FixedBigInt,
}

impl SlidingWindowDetector {
    /// Creates ReplayDetector. Created ReplayDetector doesn't allow wrapping.
    /// It can handle monotonically increasing sequence number up to
    /// full 64bit number. It is suitable for DTLS replay protection.
    pub fn new(window_size: usize, max_seq: u64) -> Self {
        SlidingWindowDetector {
            accepted: false,
            seq: 0,
            latest_seq: 0,
            max_seq,
            window_size,
            mask: FixedBigInt::new(window_size),
        }
    }
}

impl ReplayDetector for SlidingWindowDetector {
    fn check(&mut self, seq: u64) -> bool {
        self.accepted = false;

        if seq > self.max_seq {
            // Exceeded upper limit.
            return false;
        }

        if seq <= self.latest_seq {
            if self.latest_seq >= self.window_size as u64 + seq {
                return false;
            }
            if self.mask.bit((self.latest_seq - seq) as usize) != 0 {
                // The sequence number is duplicated.
                return false;
            }
        }

        self.accepted = true;
        self.seq = seq;
        true
    }

    fn accept(&mut self) {
        if !self.accepted {
            return;
        }

        if self.seq > self.latest_seq {
            // Update the head of the window.
            self.mask.lsh((self.seq - self.latest_seq) as usize);
            self.latest_seq = self.seq;
        }
        let diff = self.latest_seq - self.seq;
        self.mask.set_bit(diff as usize);
    }
}

/// NoOpReplayDetector accepts every index.
#[derive(Default, Debug, Clone, Copy)]
pub struct NoOpReplayDetector;

impl ReplayDetector for NoOpReplayDetector {
    fn check(&mut self, _: u64) -> bool {
        true
    }
    fn accept(&mut self) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sliding_window_in_order() {
        let mut det = SlidingWindowDetector::new(64, u64::MAX);
        for seq in 0..200u64 {
            assert!(det.check(seq), "seq {seq} rejected");
            det.accept();
        }
    }

    #[test]
    fn test_sliding_window_duplicate() {
        let mut det = SlidingWindowDetector::new(64, u64::MAX);
        for seq in [1u64, 2, 3] {
            assert!(det.check(seq));
            det.accept();
        }
        assert!(!det.check(2), "duplicate accepted");
        assert!(!det.check(3), "duplicate accepted");
    }

    #[test]
    fn test_sliding_window_reorder_and_too_old() {
        let mut det = SlidingWindowDetector::new(16, u64::MAX);
        assert!(det.check(100));
        det.accept();

        // Late but inside the window.
        assert!(det.check(90));
        det.accept();
        assert!(!det.check(90));

        // Outside the window.
        assert!(!det.check(84));
    }

    #[test]
    fn test_sliding_window_check_without_accept() {
        let mut det = SlidingWindowDetector::new(64, u64::MAX);
        assert!(det.check(5));
        // A failed authentication never calls accept, so the index stays usable.
        assert!(det.check(5));
        det.accept();
        assert!(!det.check(5));
    }

    #[test]
    fn test_sliding_window_max_seq() {
        let mut det = SlidingWindowDetector::new(64, 0x7FFF_FFFF);
        assert!(!det.check(0x8000_0000));
    }

    #[test]
    fn test_fixed_big_int_shift_across_chunks() {
        let mut bi = FixedBigInt::new(130);
        bi.set_bit(0);
        bi.set_bit(63);
        bi.lsh(65);
        assert_eq!(bi.bit(65), 1);
        assert_eq!(bi.bit(128), 1);
        assert_eq!(bi.bit(0), 0);
        bi.lsh(10);
        // Bit 128 + 10 falls out of the window.
        assert_eq!(bi.bit(75), 1);
        assert_eq!(bi.bits[2] >> 2, 0);
    }
}
