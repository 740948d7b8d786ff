use std::collections::VecDeque;
use std::time::Duration;

const WINDOW: usize = 120;

/// Rolling frame time statistics for the stats window.
#[derive(Debug, Default)]
pub struct FrameStats {
    frame_times: VecDeque<f32>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, frame_time: Duration) {
        if self.frame_times.len() == WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time.as_secs_f32());
    }

    /// Average frame time in milliseconds
    pub fn average_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32 * 1000.0
    }

    pub fn fps(&self) -> f32 {
        let ms = self.average_ms();
        if ms > 0.0 {
            1000.0 / ms
        } else {
            0.0
        }
    }

    pub fn max_ms(&self) -> f32 {
        self.frame_times.iter().copied().fold(0.0, f32::max) * 1000.0
    }
}
