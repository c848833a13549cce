//! Sample FIFO used to re-block fixed-size audio frames.
//!
//! The echo canceller receives audio in frames of one size and processes it
//! in blocks of another. A [`RingBuffer`] absorbs the difference: frames are
//! written in, blocks are read out, and when a consumer needs a full frame
//! that is not available yet the missing samples are [stuffed](RingBuffer::stuff_zeros)
//! as silence *ahead* of the unread data.
//!
//! Storage is allocated once, fallibly, at construction.

#![deny(unsafe_code)]

use std::collections::TryReserveError;
use std::num::NonZero;

/// Fixed-capacity FIFO of `T` values.
///
/// # Invariants
///
/// - `read_pos < capacity`
/// - `len <= capacity`, so `available_read() + available_write() == capacity`
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    read_pos: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Allocates a buffer holding up to `capacity` elements.
    ///
    /// Fails only when the allocator refuses the storage.
    pub fn try_new(capacity: NonZero<usize>) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity.get())?;
        data.resize(capacity.get(), T::default());
        Ok(Self {
            data,
            read_pos: 0,
            len: 0,
        })
    }

    /// Empties the buffer and zeroes its storage.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
        self.data.fill(T::default());
    }

    /// Inserts up to `count` default values in front of the unread data.
    ///
    /// The read cursor moves backwards, so the inserted values are the next
    /// ones returned by [`read`](Self::read), followed by whatever was
    /// already buffered. Returns the number of values inserted, limited by
    /// the free space.
    pub fn stuff_zeros(&mut self, count: usize) -> usize {
        let count = count.min(self.available_write());
        let capacity = self.capacity();
        let start = (self.read_pos + capacity - count) % capacity;
        let first = count.min(capacity - start);
        self.data[start..start + first].fill(T::default());
        self.data[..count - first].fill(T::default());
        self.read_pos = start;
        self.len += count;
        count
    }
}

impl<T: Copy> RingBuffer<T> {
    /// Maximum number of elements the buffer holds.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of elements waiting to be read.
    pub fn available_read(&self) -> usize {
        self.len
    }

    /// Number of elements that can be written before the buffer is full.
    pub fn available_write(&self) -> usize {
        self.capacity() - self.len
    }

    /// Appends as much of `samples` as fits. Returns the number written.
    pub fn write(&mut self, samples: &[T]) -> usize {
        let count = samples.len().min(self.available_write());
        let capacity = self.capacity();
        let start = (self.read_pos + self.len) % capacity;
        let first = count.min(capacity - start);
        self.data[start..start + first].copy_from_slice(&samples[..first]);
        self.data[..count - first].copy_from_slice(&samples[first..count]);
        self.len += count;
        count
    }

    /// Moves up to `out.len()` elements into `out`. Returns the number read.
    pub fn read(&mut self, out: &mut [T]) -> usize {
        let count = out.len().min(self.len);
        let capacity = self.capacity();
        let first = count.min(capacity - self.read_pos);
        out[..first].copy_from_slice(&self.data[self.read_pos..self.read_pos + first]);
        out[first..count].copy_from_slice(&self.data[..count - first]);
        self.read_pos = (self.read_pos + count) % capacity;
        self.len -= count;
        count
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::RingBuffer;

    fn rb(capacity: usize) -> RingBuffer<i16> {
        RingBuffer::try_new(NonZero::new(capacity).unwrap()).unwrap()
    }

    /// Interleaved random writes and reads of a counting sequence; every read
    /// must continue the sequence where the previous read stopped.
    fn counting_stress(seed: u64) {
        let mut state = seed;
        let mut next = || -> usize {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as usize
        };

        for _ in 0..10 {
            let capacity = (next() % 400).max(1);
            let mut buffer = rb(capacity);
            let mut scratch = vec![0i16; capacity];
            let mut written_value: i16 = 0;
            let mut read_value: i16 = 0;
            let mut held = 0usize;

            for _ in 0..1000 {
                let n = next() % capacity;
                if next() % 2 == 0 {
                    let expected = n.min(capacity - held);
                    for v in scratch[..n].iter_mut() {
                        *v = written_value;
                        written_value = written_value.wrapping_add(1);
                    }
                    // Only the first `expected` values actually enter the buffer.
                    written_value = written_value.wrapping_sub((n - expected) as i16);
                    assert_eq!(expected, buffer.write(&scratch[..n]));
                    held += expected;
                } else {
                    let expected = n.min(held);
                    assert_eq!(expected, buffer.read(&mut scratch[..n]));
                    for &v in &scratch[..expected] {
                        assert_eq!(read_value, v);
                        read_value = read_value.wrapping_add(1);
                    }
                    held -= expected;
                }
                assert_eq!(held, buffer.available_read());
            }
        }
    }

    #[test]
    fn counting_stress_keeps_order() {
        counting_stress(12345);
        counting_stress(0x5eed_cafe);
    }

    #[test]
    fn write_stops_when_full() {
        let mut buf = rb(4);
        assert_eq!(4, buf.write(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(0, buf.available_write());
        assert_eq!(0, buf.write(&[7]));
    }

    #[test]
    fn read_from_empty_returns_nothing() {
        let mut buf = rb(4);
        let mut out = [9i16; 4];
        assert_eq!(0, buf.read(&mut out));
        assert_eq!(out, [9; 4]);
    }

    #[test]
    fn stuffed_zeros_come_before_buffered_data() {
        let mut buf = rb(8);
        buf.write(&[1, 2, 3]);
        assert_eq!(2, buf.stuff_zeros(2));
        let mut out = [7i16; 5];
        assert_eq!(5, buf.read(&mut out));
        assert_eq!(out, [0, 0, 1, 2, 3]);
    }

    #[test]
    fn stuffing_wraps_behind_read_cursor() {
        let mut buf = rb(4);
        buf.write(&[1, 2]);
        let mut out = [0i16; 1];
        buf.read(&mut out);
        // One element left at index 1; stuffing three must wrap to the end.
        assert_eq!(3, buf.stuff_zeros(3));
        let mut out = [5i16; 4];
        assert_eq!(4, buf.read(&mut out));
        assert_eq!(out, [0, 0, 0, 2]);
    }

    #[test]
    fn stuffing_is_limited_by_free_space() {
        let mut buf = rb(4);
        buf.write(&[1, 2, 3]);
        assert_eq!(1, buf.stuff_zeros(10));
        assert_eq!(4, buf.available_read());
    }

    #[test]
    fn stuffing_empty_buffer_yields_silence() {
        let mut buf = rb(6);
        buf.write(&[4, 4, 4, 4]);
        let mut drain = [0i16; 4];
        buf.read(&mut drain);
        buf.stuff_zeros(6);
        let mut out = [1i16; 6];
        assert_eq!(6, buf.read(&mut out));
        assert_eq!(out, [0; 6]);
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buf = rb(4);
        buf.write(&[1, 2, 3, 4]);
        buf.clear();
        assert_eq!(0, buf.available_read());
        assert_eq!(4, buf.available_write());
    }

    #[proptest]
    fn read_plus_write_space_is_capacity(
        #[strategy(1..=300usize)] capacity: usize,
        #[strategy(pvec(any::<i16>(), 0..300))] data: Vec<i16>,
        #[strategy(0..300usize)] stuffed: usize,
    ) {
        let mut buf = rb(capacity);
        buf.write(&data);
        buf.stuff_zeros(stuffed);
        prop_assert_eq!(buf.available_read() + buf.available_write(), capacity);
    }

    #[proptest]
    fn write_then_read_returns_same_samples(
        #[strategy(1..=300usize)] capacity: usize,
        #[strategy(pvec(any::<i16>(), 0..=#capacity))] data: Vec<i16>,
        #[strategy(0..=#capacity)] offset: usize,
    ) {
        let mut buf = rb(capacity);
        // Shift the cursors so the payload crosses the wrap point.
        let pad = vec![0i16; offset];
        buf.write(&pad);
        let mut sink = vec![0i16; offset];
        buf.read(&mut sink);

        let written = buf.write(&data);
        let mut out = vec![0i16; written];
        prop_assert_eq!(buf.read(&mut out), written);
        prop_assert_eq!(&out[..], &data[..written]);
    }
}
