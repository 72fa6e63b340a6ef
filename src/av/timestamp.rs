/// Microseconds per second, the time base of every emitted timestamp.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Derives audio timestamps from a running count of sample frames.
///
/// Each timestamp is computed from the base and the total frame count, so
/// rounding never accumulates across frames.
#[derive(Debug, Clone)]
pub struct AudioTimestampHelper {
    samples_per_second: u32,
    base_timestamp: Option<i64>,
    frame_count: i64,
}

impl AudioTimestampHelper {
    pub fn new(samples_per_second: u32) -> Self {
        Self {
            samples_per_second: samples_per_second.max(1),
            base_timestamp: None,
            frame_count: 0,
        }
    }

    pub fn samples_per_second(&self) -> u32 {
        self.samples_per_second
    }

    /// Restarts the clock at `base_timestamp` with a zero frame count.
    pub fn set_base_timestamp(&mut self, base_timestamp: i64) {
        self.base_timestamp = Some(base_timestamp);
        self.frame_count = 0;
    }

    pub fn base_timestamp(&self) -> Option<i64> {
        self.base_timestamp
    }

    pub fn add_frames(&mut self, frame_count: i64) {
        self.frame_count += frame_count;
    }

    pub fn frame_count(&self) -> i64 {
        self.frame_count
    }

    /// Timestamp of the next frame, or `None` before any base was set.
    pub fn timestamp(&self) -> Option<i64> {
        self.base_timestamp
            .map(|base| base + self.frames_to_micros(self.frame_count))
    }

    /// Duration of the next `frame_count` frames.
    pub fn frame_duration(&self, frame_count: i64) -> i64 {
        self.frames_to_micros(self.frame_count + frame_count)
            - self.frames_to_micros(self.frame_count)
    }

    fn frames_to_micros(&self, frames: i64) -> i64 {
        (frames as i128 * MICROS_PER_SECOND as i128 / self.samples_per_second as i128) as i64
    }
}
