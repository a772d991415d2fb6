/// Rate limit for the terminal preview.
///
/// A changed frame is drawn at most once per `min_interval_ms`; an unchanged
/// frame is redrawn only every `idle_refresh_ms` (to repair a garbled
/// terminal).
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    min_interval_ms: u64,
    idle_refresh_ms: u64,
    last_render_ms: u64,
    last_fingerprint: u64,
    has_rendered: bool,
    skipped: u64,
}

impl RenderThrottle {
    pub fn new(min_interval_ms: u64, idle_refresh_ms: u64) -> Self {
        Self {
            min_interval_ms,
            idle_refresh_ms: idle_refresh_ms.max(min_interval_ms),
            last_render_ms: 0,
            last_fingerprint: 0,
            has_rendered: false,
            skipped: 0,
        }
    }

    /// Throttle to at most `fps` draws per second; 0 means unthrottled.
    pub fn from_fps(fps: u32, idle_refresh_ms: u64) -> Self {
        let min_interval_ms = if fps == 0 { 0 } else { 1000 / fps as u64 };
        Self::new(min_interval_ms, idle_refresh_ms)
    }

    /// Frames dropped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn should_render(&mut self, now_ms: u64, fingerprint: u64) -> bool {
        let since = now_ms.saturating_sub(self.last_render_ms);
        let render = !self.has_rendered
            || (since >= self.min_interval_ms
                && (fingerprint != self.last_fingerprint || since >= self.idle_refresh_ms));

        if render {
            self.has_rendered = true;
            self.last_render_ms = now_ms;
            self.last_fingerprint = fingerprint;
        } else {
            self.skipped += 1;
        }
        render
    }
}
