//! Playback position shared by every synchronized source video.
//!
//! All annotation timestamps are milliseconds from the start of the
//! recordings. The cursor is the single "current time" that trigger
//! keys are stamped with; seeking never leaves `[0, duration]`.

use crate::config::PlaybackDefaults;

/// Lowest and highest playback speed multipliers.
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 5.0;

/// Current playback position over a set of synchronized sources.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    position_ms: u64,
    duration_ms: u64,
    /// Slowest frame rate among loaded sources; frame steps use this.
    fps: f64,
    speed: f64,
    small_jump_ms: u64,
    large_jump_ms: u64,
}

impl PlaybackCursor {
    /// Create a cursor at position zero.
    pub fn new(duration_ms: u64, defaults: &PlaybackDefaults) -> Self {
        Self {
            position_ms: 0,
            duration_ms,
            fps: defaults.fallback_fps,
            speed: 1.0,
            small_jump_ms: defaults.small_jump_ms,
            large_jump_ms: defaults.large_jump_ms,
        }
    }

    /// Register a source's frame rate; only a slower rate changes stepping.
    pub fn register_source_fps(&mut self, fps: f64) {
        if fps > 0.0 && fps < self.fps {
            self.fps = fps.ceil();
        }
    }

    /// Current position in milliseconds.
    pub fn current_ms(&self) -> u64 {
        self.position_ms
    }

    /// Total duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Update the duration, pulling the position back inside if needed.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
        self.position_ms = self.position_ms.min(duration_ms);
    }

    /// Seek to an absolute position.
    pub fn seek_to(&mut self, position_ms: u64) -> u64 {
        self.position_ms = position_ms.min(self.duration_ms);
        self.position_ms
    }

    /// Seek by a signed offset.
    pub fn seek_relative(&mut self, delta_ms: i64) -> u64 {
        let target = if delta_ms < 0 {
            self.position_ms.saturating_sub(delta_ms.unsigned_abs())
        } else {
            self.position_ms.saturating_add(delta_ms as u64)
        };
        self.seek_to(target)
    }

    /// Move by whole frames (negative steps backwards).
    pub fn step_frames(&mut self, frames: i64) -> u64 {
        let frame_ms = 1000.0 / self.fps;
        let delta = (frames as f64 * frame_ms).round() as i64;
        self.seek_relative(delta)
    }

    /// Short jump forward or backward.
    pub fn jump_small(&mut self, forward: bool) -> u64 {
        let delta = self.small_jump_ms as i64;
        self.seek_relative(if forward { delta } else { -delta })
    }

    /// Long jump forward or backward.
    pub fn jump_large(&mut self, forward: bool) -> u64 {
        let delta = self.large_jump_ms as i64;
        self.seek_relative(if forward { delta } else { -delta })
    }

    /// Playback speed multiplier.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the playback speed, clamped to the supported range.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.speed
    }

    /// Frame rate used for stepping.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(duration_ms: u64) -> PlaybackCursor {
        PlaybackCursor::new(duration_ms, &PlaybackDefaults::default())
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut c = cursor(10_000);
        assert_eq!(c.seek_to(25_000), 10_000);
        assert_eq!(c.seek_relative(-40_000), 0);
    }

    #[test]
    fn test_jumps_use_configured_sizes() {
        let mut c = cursor(60_000);
        c.seek_to(20_000);
        assert_eq!(c.jump_small(true), 25_000);
        assert_eq!(c.jump_large(false), 15_000);
    }

    #[test]
    fn test_frame_step_follows_slowest_source() {
        let mut c = cursor(60_000);
        c.register_source_fps(59.94);
        assert!((c.fps() - 30.0).abs() < 1e-9);

        c.register_source_fps(24.5);
        assert!((c.fps() - 25.0).abs() < 1e-9);
        assert_eq!(c.step_frames(5), 200);
        assert_eq!(c.step_frames(-1), 160);
    }

    #[test]
    fn test_speed_clamped() {
        let mut c = cursor(1_000);
        assert!((c.set_speed(12.0) - MAX_SPEED).abs() < 1e-9);
        assert!((c.set_speed(0.0) - MIN_SPEED).abs() < 1e-9);
    }

    #[test]
    fn test_shrinking_duration_pulls_position_back() {
        let mut c = cursor(10_000);
        c.seek_to(9_000);
        c.set_duration(4_000);
        assert_eq!(c.current_ms(), 4_000);
    }
}
