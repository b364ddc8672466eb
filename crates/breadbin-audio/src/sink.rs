/// Audio sink used by the mixer to emit mono `i16` frames.
///
/// This is intentionally small to make it easy to bridge the mixer to
/// different backends:
/// - a plain `Vec<i16>` (unit tests, offline rendering)
/// - a host audio callback's sample queue
pub trait AudioSink {
    /// Push mono `i16` frames, one sample per frame.
    fn push_frames(&mut self, frames: &[i16]);
}

impl AudioSink for Vec<i16> {
    fn push_frames(&mut self, frames: &[i16]) {
        self.extend_from_slice(frames);
    }
}
