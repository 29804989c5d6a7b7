use crate::models::device::CaptureFormat;

/// Circular buffer of processed samples waiting for the transport.
///
/// Wrap in `parking_lot::Mutex` for cross-thread access. On overflow the
/// oldest samples are dropped and counted.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Vec<f32>,
    write_index: usize,
    read_index: usize,
    available: usize,
    dropped: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_index: 0,
            read_index: 0,
            available: 0,
            dropped: 0,
        }
    }

    /// Buffer sized to hold `millis` of interleaved audio in `format`.
    pub fn for_duration(format: CaptureFormat, millis: u32) -> Self {
        Self::new(format.samples_per_second() * millis as usize / 1000)
    }

    /// Write samples, dropping the oldest on overflow.
    ///
    /// If `samples` is larger than capacity, only the last `capacity` samples are kept.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let capacity = self.capacity();

        let samples = if samples.len() > capacity {
            self.dropped += (samples.len() - capacity) as u64;
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let overflow = (self.available + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
            self.dropped += overflow as u64;
        }

        // Copy in at most two contiguous runs.
        let first = samples.len().min(capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&samples[..first]);
        self.buffer[..samples.len() - first].copy_from_slice(&samples[first..]);
        self.write_index = (self.write_index + samples.len()) % capacity;
        self.available += samples.len();
    }

    /// Read and remove up to `count` samples.
    pub fn read(&mut self, count: usize) -> Vec<f32> {
        let mut out = vec![0.0; count.min(self.available)];
        let n = self.read_into(&mut out);
        out.truncate(n);
        out
    }

    /// Drain into `out`, returning how many samples were written.
    pub fn read_into(&mut self, out: &mut [f32]) -> usize {
        let to_read = out.len().min(self.available);
        let capacity = self.capacity();
        for (i, slot) in out.iter_mut().take(to_read).enumerate() {
            *slot = self.buffer[(self.read_index + i) % capacity];
        }
        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        to_read
    }

    /// Number of samples currently available for reading.
    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Total samples lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0]);

        assert_eq!(buf.count(), 3);
        assert_eq!(buf.read(3), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0, 4.0]);
        buf.write(&[5.0, 6.0]);

        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn write_larger_than_capacity_keeps_tail() {
        let mut buf = RingBuffer::new(3);
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.read(3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0]);
        buf.read(2);
        buf.write(&[4.0, 5.0, 6.0]);

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn read_into_partial_slice() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[1.0, 2.0]);
        let mut out = [0.0; 5];
        assert_eq!(buf.read_into(&mut out), 2);
        assert_eq!(&out[..2], &[1.0, 2.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn sized_by_duration() {
        let buf = RingBuffer::for_duration(CaptureFormat::new(48000, 2), 500);
        assert_eq!(buf.capacity(), 48000);
    }
}
