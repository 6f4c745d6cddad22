//! Fixed-window framing for capture audio.
//!
//! Device callbacks deliver frames of whatever size the backend picks. The
//! gateway expects chunks of a constant length, so frames are accumulated and
//! emitted in windows of exactly `size` samples. A trailing partial window is
//! never emitted: it is discarded with the chunker.

/// Accumulates samples and emits fixed-size windows.
#[derive(Debug)]
pub struct FrameChunker {
    size: usize,
    buf: Vec<f32>,
}

impl FrameChunker {
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "chunk size must be positive");
        Self {
            size,
            buf: Vec::with_capacity(size),
        }
    }

    /// Append a frame and call `emit` once per completed window, in order.
    pub fn push(&mut self, mut frame: &[f32], mut emit: impl FnMut(&[f32])) {
        while !frame.is_empty() {
            let take = (self.size - self.buf.len()).min(frame.len());
            self.buf.extend_from_slice(&frame[..take]);
            frame = &frame[take..];

            if self.buf.len() == self.size {
                emit(&self.buf);
                self.buf.clear();
            }
        }
    }

    /// Samples waiting for a full window.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunker: &mut FrameChunker, frame: &[f32]) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        chunker.push(frame, |w| out.push(w.to_vec()));
        out
    }

    #[test]
    fn exact_frames_pass_straight_through() {
        let mut chunker = FrameChunker::new(4);
        let out = collect(&mut chunker, &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(out, vec![vec![0.1, 0.2, 0.3, 0.4]]);
        assert_eq!(chunker.buffered(), 0);
    }

    #[test]
    fn small_frames_accumulate_across_calls() {
        let mut chunker = FrameChunker::new(4);
        assert!(collect(&mut chunker, &[1.0, 2.0, 3.0]).is_empty());
        let out = collect(&mut chunker, &[4.0, 5.0]);
        assert_eq!(out, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(chunker.buffered(), 1);
    }

    #[test]
    fn large_frame_splits_into_ordered_windows() {
        let mut chunker = FrameChunker::new(2);
        let out = collect(&mut chunker, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(chunker.buffered(), 1);
    }

    #[test]
    fn partial_tail_is_never_padded() {
        let mut chunker = FrameChunker::new(4096);
        let out = collect(&mut chunker, &vec![0.5; 5000]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 4096);
        // The remaining 904 samples are dropped with the chunker.
        assert_eq!(chunker.buffered(), 904);
    }
}
