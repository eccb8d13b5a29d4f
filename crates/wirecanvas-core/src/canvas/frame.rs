//! Frame scheduling.

/// Decides when a new frame should be drawn.
///
/// The canvas redraws only when something is dirty, rendering is running
/// and not paused, and the minimum gap for `maximum_fps` has elapsed.
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    dirty_foreground: bool,
    dirty_background: bool,
    paused: bool,
    rendering: bool,
    last_draw_ms: Option<f64>,
    /// Minimum time between frames, if capped.
    pub min_interval_ms: Option<f64>,
}

impl FrameScheduler {
    pub fn new(min_interval_ms: Option<f64>) -> Self {
        Self {
            min_interval_ms,
            dirty_foreground: true,
            dirty_background: true,
            ..Self::default()
        }
    }

    pub fn set_dirty(&mut self, foreground: bool, background: bool) {
        self.dirty_foreground |= foreground;
        self.dirty_background |= background;
    }

    pub fn mark_dirty(&mut self) {
        self.set_dirty(true, true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_foreground || self.dirty_background
    }

    pub fn is_background_dirty(&self) -> bool {
        self.dirty_background
    }

    /// Start the render loop. Returns false if it was already running.
    pub fn start(&mut self) -> bool {
        if self.rendering {
            log::debug!("render loop already running");
            return false;
        }
        self.rendering = true;
        self.paused = false;
        self.mark_dirty();
        true
    }

    pub fn stop(&mut self) {
        self.rendering = false;
    }

    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
        if !paused {
            self.mark_dirty();
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a frame should be drawn at `now_ms`.
    pub fn should_draw(&self, now_ms: f64) -> bool {
        if !self.rendering || self.paused || !self.is_dirty() {
            return false;
        }
        match (self.min_interval_ms, self.last_draw_ms) {
            (Some(interval), Some(last)) => now_ms - last >= interval,
            _ => true,
        }
    }

    /// Record that a frame was drawn.
    pub fn frame_drawn(&mut self, now_ms: f64) {
        self.last_draw_ms = Some(now_ms);
        self.dirty_foreground = false;
        self.dirty_background = false;
    }
}
