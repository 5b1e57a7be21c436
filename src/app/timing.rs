use std::time::{Duration, Instant};
use winit::window::Window;

const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Frame statistics shown in the window title. While a status message is
/// set (loading or error overlay), the title shows that instead.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_report_time: Instant,
    frame_count: u32,
    frame_ms: f32,
    base_title: String,
    shown_status: Option<String>,
}

impl FrameTiming {
    pub fn new(base_title: String, now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_report_time: now,
            frame_count: 0,
            frame_ms: 0.0,
            base_title,
            shown_status: None,
        }
    }

    pub fn record_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_frame_time {
            self.frame_ms = now.saturating_duration_since(last).as_secs_f32() * 1000.0;
        }
        self.last_frame_time = Some(now);
        self.frame_count = self.frame_count.saturating_add(1);
    }

    /// Title to show now, or `None` when it should stay as is.
    pub fn title(&mut self, status: Option<&str>, now: Instant) -> Option<String> {
        if let Some(status) = status {
            if self.shown_status.as_deref() == Some(status) {
                return None;
            }
            self.shown_status = Some(status.to_string());
            return Some(format!("{} - {}", self.base_title, status));
        }
        self.shown_status = None;

        let elapsed = now.saturating_duration_since(self.last_report_time);
        if elapsed < REPORT_INTERVAL {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_report_time = now;
        Some(format!(
            "{} - {:.1} fps ({:.2} ms)",
            self.base_title, fps, self.frame_ms
        ))
    }

    pub fn update_title(&mut self, window: &Window, status: Option<&str>, now: Instant) {
        if let Some(title) = self.title(status, now) {
            window.set_title(&title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameTiming;
    use std::time::{Duration, Instant};

    #[test]
    fn status_is_shown_once_until_it_changes() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("hero".to_string(), start);
        assert_eq!(
            timing.title(Some("Loading 3D Model..."), start).as_deref(),
            Some("hero - Loading 3D Model...")
        );
        assert_eq!(timing.title(Some("Loading 3D Model..."), start), None);
        assert_eq!(
            timing.title(Some("Error loading model."), start).as_deref(),
            Some("hero - Error loading model.")
        );
    }

    #[test]
    fn fps_reported_every_half_second() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("hero".to_string(), start);
        for i in 0..30 {
            timing.record_frame(start + Duration::from_millis(i * 10));
        }
        assert_eq!(timing.title(None, start + Duration::from_millis(100)), None);
        let title = timing.title(None, start + Duration::from_millis(500)).unwrap();
        assert!(title.starts_with("hero - 60.0 fps"), "{title}");
        assert!(title.contains("10.00 ms"), "{title}");
    }
}
