//! Viewport module for pan/zoom transforms between screen and graph space.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest bounds dimension considered when fitting the view.
const MIN_FIT_EXTENT: f64 = 300.0;

/// Margin added around the visible area before culling (origin side).
pub const CULL_MARGIN: f64 = 20.0;

/// Default fraction of the viewport the fitted bounds should occupy.
pub const DEFAULT_FIT_ZOOM: f64 = 0.75;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 10.0;

/// Default duration of an animated viewport move, in milliseconds.
pub const DEFAULT_ANIMATION_MS: f64 = 350.0;

/// Easing curve for animated viewport changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    EaseInQuad,
    EaseOutQuad,
    #[default]
    EaseInOutQuad,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => t * (2.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// Options for [`Viewport::animate_to_bounds`].
#[derive(Debug, Clone, Copy)]
pub struct AnimationOptions {
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// Relative target zoom. 1 fits the bounds exactly; 0 or less keeps the
    /// current scale and only pans.
    pub zoom: f64,
    pub easing: Easing,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_ANIMATION_MS,
            zoom: DEFAULT_FIT_ZOOM,
            easing: Easing::EaseInOutQuad,
        }
    }
}

/// An in-flight viewport animation.
#[derive(Debug, Clone)]
struct ViewportAnimation {
    start_ms: f64,
    options: AnimationOptions,
    viewport_size: Size,
    start_offset: Vec2,
    start_far: Vec2,
    target_offset: Vec2,
    target_far: Vec2,
}

/// Viewport manages the pan/zoom state of the canvas.
///
/// Graph coordinates map to screen coordinates as
/// `screen = (graph + offset) * scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Translation applied in graph units before scaling.
    pub offset: Vec2,
    /// Current zoom level (1.0 = 100%).
    pub scale: f64,
    /// Minimum allowed zoom level.
    pub min_scale: f64,
    /// Maximum allowed zoom level.
    pub max_scale: f64,
    #[serde(skip)]
    animation: Option<ViewportAnimation>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            animation: None,
        }
    }
}

impl Viewport {
    /// Create a new viewport with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Affine transform converting graph coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.scale) * Affine::translate(self.offset)
    }

    /// Convert a screen point to graph coordinates.
    pub fn to_graph(&self, screen: Point) -> Point {
        Point::new(
            screen.x / self.scale - self.offset.x,
            screen.y / self.scale - self.offset.y,
        )
    }

    /// Convert a graph point to screen coordinates.
    pub fn to_screen(&self, graph: Point) -> Point {
        Point::new(
            (graph.x + self.offset.x) * self.scale,
            (graph.y + self.offset.y) * self.scale,
        )
    }

    /// Pan by a delta given in screen pixels.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.offset += screen_delta / self.scale;
    }

    /// Change the zoom level, keeping the graph point under `pivot` (screen
    /// coordinates) visually fixed.
    ///
    /// Scales within 1% of 1.0 snap to exactly 1.0 unless
    /// `round_to_one` is false (used for smooth trackpad zooming).
    pub fn change_scale(&mut self, value: f64, pivot: Point, round_to_one: bool) {
        let value = value.clamp(self.min_scale, self.max_scale);
        if value == self.scale {
            return;
        }

        let before = self.to_graph(pivot);
        self.scale = value;
        if round_to_one && (self.scale - 1.0).abs() < 0.01 {
            self.scale = 1.0;
        }
        let after = self.to_graph(pivot);
        self.offset += after - before;
    }

    /// Multiply the current zoom by `factor` around `pivot`.
    pub fn change_delta_scale(&mut self, factor: f64, pivot: Point) {
        self.change_scale(self.scale * factor, pivot, true);
    }

    /// Graph-space rectangle currently on screen.
    pub fn compute_visible_area(&self, viewport_size: Size) -> Rect {
        let start = Point::new(-self.offset.x, -self.offset.y);
        Rect::from_origin_size(
            start,
            Size::new(viewport_size.width / self.scale, viewport_size.height / self.scale),
        )
    }

    /// Visible area grown by a small margin; every culling pass tests against
    /// this rectangle.
    pub fn margin_area(&self, viewport_size: Size) -> Rect {
        let visible = self.compute_visible_area(viewport_size);
        Rect::from_origin_size(
            (visible.x0 - CULL_MARGIN, visible.y0 - CULL_MARGIN),
            (visible.width() + 2.0 * CULL_MARGIN, visible.height() + 2.0 * CULL_MARGIN),
        )
    }

    /// Reset to the origin at 100% zoom.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.offset = Vec2::ZERO;
        self.animation = None;
    }

    /// Target scale that fits `bounds` into the viewport at relative `zoom`.
    fn fit_scale(&self, bounds: Rect, viewport_size: Size, zoom: f64) -> f64 {
        if zoom <= 0.0 {
            return self.scale;
        }
        let sx = zoom * viewport_size.width / bounds.width().max(MIN_FIT_EXTENT);
        let sy = zoom * viewport_size.height / bounds.height().max(MIN_FIT_EXTENT);
        sx.min(sy).min(self.max_scale)
    }

    /// Offset that places the centre of `bounds` at the viewport centre.
    fn centred_offset(bounds: Rect, viewport_size: Size, scale: f64) -> Vec2 {
        let scaled = Vec2::new(viewport_size.width / scale, viewport_size.height / scale);
        Vec2::new(
            -bounds.x0 - bounds.width() * 0.5 + scaled.x * 0.5,
            -bounds.y0 - bounds.height() * 0.5 + scaled.y * 0.5,
        )
    }

    /// Immediately fit the view to `bounds`.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport_size: Size, zoom: f64) {
        let scale = self.fit_scale(bounds, viewport_size, zoom);
        self.offset = Self::centred_offset(bounds, viewport_size, scale);
        self.scale = scale;
    }

    /// Centre the view on a rectangle without changing the zoom.
    pub fn center_on(&mut self, bounds: Rect, viewport_size: Size) {
        self.offset = Self::centred_offset(bounds, viewport_size, self.scale);
    }

    /// Begin an animated move to `bounds`. Advance it with
    /// [`Viewport::tick_animation`].
    pub fn animate_to_bounds(
        &mut self,
        bounds: Rect,
        viewport_size: Size,
        options: AnimationOptions,
        now_ms: f64,
    ) {
        let options = AnimationOptions {
            duration_ms: options.duration_ms.max(1.0),
            ..options
        };
        let start_offset = self.offset;
        let start_far = Vec2::new(
            start_offset.x - viewport_size.width / self.scale,
            start_offset.y - viewport_size.height / self.scale,
        );
        let target_scale = self.fit_scale(bounds, viewport_size, options.zoom);
        let target_offset = Self::centred_offset(bounds, viewport_size, target_scale);
        let target_far = Vec2::new(
            target_offset.x - viewport_size.width / target_scale,
            target_offset.y - viewport_size.height / target_scale,
        );

        self.animation = Some(ViewportAnimation {
            start_ms: now_ms,
            options,
            viewport_size,
            start_offset,
            start_far,
            target_offset,
            target_far,
        });
    }

    /// Whether an animation is in progress.
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Advance the current animation. Returns true if the viewport changed.
    pub fn tick_animation(&mut self, now_ms: f64) -> bool {
        let Some(anim) = self.animation.clone() else {
            return false;
        };

        let progress = ((now_ms - anim.start_ms) / anim.options.duration_ms).clamp(0.0, 1.0);
        let eased = anim.options.easing.apply(progress);

        let offset = anim.start_offset + (anim.target_offset - anim.start_offset) * eased;
        self.offset = offset;

        if anim.options.zoom > 0.0 {
            let far = anim.start_far + (anim.target_far - anim.start_far) * eased;
            let width = (far.x - offset.x).abs();
            let height = (far.y - offset.y).abs();
            if width > 0.0 && height > 0.0 {
                self.scale = (anim.viewport_size.width / width).min(anim.viewport_size.height / height);
            }
        }

        if progress >= 1.0 {
            self.animation = None;
        }
        true
    }
}
