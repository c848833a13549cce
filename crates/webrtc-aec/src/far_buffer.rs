//! Far-end delay line aligning loudspeaker frames with the microphone.
//!
//! Frames are written at a write cursor and read back from an independent
//! read cursor. A change in the caller-reported delay moves the read cursor
//! by the same amount, so the fetched frame lags the written stream by the
//! accumulated delay (modulo the buffer length).

use derive_more::Debug;

use crate::common::{FAR_BUF_LEN, FRAME_LEN};

#[derive(Debug, Clone)]
pub(crate) struct FarBuffer {
    #[debug(skip)]
    samples: Box<[i16; FAR_BUF_LEN]>,
    write_pos: usize,
    read_pos: usize,
    known_delay: i32,
}

impl FarBuffer {
    pub(crate) fn new() -> Self {
        Self {
            samples: Box::new([0; FAR_BUF_LEN]),
            write_pos: 0,
            read_pos: 0,
            known_delay: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.read_pos = 0;
        self.known_delay = 0;
    }

    /// Appends one frame, overwriting the oldest samples.
    pub(crate) fn write(&mut self, frame: &[i16; FRAME_LEN]) {
        let first = FRAME_LEN.min(FAR_BUF_LEN - self.write_pos);
        self.samples[self.write_pos..self.write_pos + first].copy_from_slice(&frame[..first]);
        self.samples[..FRAME_LEN - first].copy_from_slice(&frame[first..]);
        self.write_pos = (self.write_pos + FRAME_LEN) % FAR_BUF_LEN;
    }

    /// Reads one frame, first shifting the read cursor back by the change in
    /// `known_delay` since the previous fetch.
    ///
    /// Delays are not validated; the cursor simply wraps.
    pub(crate) fn fetch(&mut self, known_delay: i32, out: &mut [i16; FRAME_LEN]) {
        let delay_change = i64::from(known_delay) - i64::from(self.known_delay);
        if delay_change != 0 {
            tracing::trace!(known_delay, delay_change, "far-end delay changed");
        }
        let len = FAR_BUF_LEN as i64;
        self.read_pos = (self.read_pos as i64 - delay_change).rem_euclid(len) as usize;
        self.known_delay = known_delay;

        let first = FRAME_LEN.min(FAR_BUF_LEN - self.read_pos);
        out[..first].copy_from_slice(&self.samples[self.read_pos..self.read_pos + first]);
        out[first..].copy_from_slice(&self.samples[..FRAME_LEN - first]);
        self.read_pos = (self.read_pos + FRAME_LEN) % FAR_BUF_LEN;
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    fn counting_frame(start: i32) -> [i16; FRAME_LEN] {
        std::array::from_fn(|i| (start + i as i32) as i16)
    }

    #[test]
    fn zero_delay_returns_the_frame_just_written() {
        let mut far = FarBuffer::new();
        let mut out = [0i16; FRAME_LEN];
        for n in 0..100 {
            let frame = counting_frame(n * FRAME_LEN as i32);
            far.write(&frame);
            far.fetch(0, &mut out);
            assert_eq!(out, frame, "frame {n}");
        }
    }

    #[test]
    fn fixed_delay_lags_by_that_many_samples() {
        let delay = 200;
        let mut far = FarBuffer::new();
        let mut out = [0i16; FRAME_LEN];
        let mut history: Vec<i16> = Vec::new();
        for n in 0..80 {
            let frame = counting_frame(n * FRAME_LEN as i32 + 1);
            history.extend_from_slice(&frame);
            far.write(&frame);
            far.fetch(delay, &mut out);
            let end = history.len();
            for (i, &v) in out.iter().enumerate() {
                let src = end as i64 - FRAME_LEN as i64 - delay as i64 + i as i64;
                let expected = if src >= 0 { history[src as usize] } else { 0 };
                assert_eq!(v, expected, "frame {n} sample {i}");
            }
        }
    }

    #[test]
    fn delay_change_moves_read_cursor() {
        let mut far = FarBuffer::new();
        let mut out = [0i16; FRAME_LEN];
        let mut history: Vec<i16> = Vec::new();
        for n in 0..60 {
            let frame = counting_frame(n * FRAME_LEN as i32 + 7);
            history.extend_from_slice(&frame);
            far.write(&frame);
            let delay = if n < 30 { 16 } else { 96 };
            far.fetch(delay, &mut out);
            if n >= 2 {
                let start = history.len() - FRAME_LEN - delay as usize;
                assert_eq!(&out[..], &history[start..start + FRAME_LEN], "frame {n}");
            }
        }
    }

    #[proptest]
    fn fetch_matches_linear_history(
        #[strategy(0..(FAR_BUF_LEN as i32 - FRAME_LEN as i32))] delay: i32,
        #[strategy(1..120usize)] frames: usize,
    ) {
        let mut far = FarBuffer::new();
        let mut out = [0i16; FRAME_LEN];
        let mut history: Vec<i16> = Vec::new();
        for n in 0..frames {
            let frame = counting_frame(n as i32 * FRAME_LEN as i32 + 1);
            history.extend_from_slice(&frame);
            far.write(&frame);
            far.fetch(delay, &mut out);
        }
        let end = history.len() as i64 - FRAME_LEN as i64 - delay as i64;
        for (i, &v) in out.iter().enumerate() {
            let src = end + i as i64;
            let expected = if src >= 0 { history[src as usize] } else { 0 };
            prop_assert_eq!(v, expected);
        }
    }
}
