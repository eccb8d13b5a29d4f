//! Pointer gesture machine.
//!
//! Turns raw down/move/up samples into click, double-click and drag
//! callbacks. The callbacks for one gesture are bundled in a
//! [`GestureHandler`] value that the canvas builds on pointer-down from the
//! hit-test result; [`CanvasPointer`] is the single dispatcher driving it.
//!
//! Exactly one of `on_click`, `on_double_click` or the
//! `on_drag_start` .. `on_drag_end` pair fires per gesture, and `finally`
//! always fires when the gesture ends (up, cancel, or a new down).

use crate::input::{PointerEvent, WheelEvent};
use crate::measure::CompassCorner;

/// Time after pointer-down at which a held press becomes a drag, in ms.
pub const BUFFER_TIME_MS: f64 = 150.0;
/// Maximum gap between two clicks for a double-click, in ms.
pub const DOUBLE_CLICK_TIME_MS: f64 = 300.0;
/// Maximum pointer drift (screen pixels) for a press to remain a click.
pub const MAX_CLICK_DRIFT: f64 = 6.0;
/// Wheel deltas below this magnitude are treated as trackpad input.
pub const TRACKPAD_THRESHOLD: f64 = 60.0;
/// Wheel events within this gap continue a trackpad gesture, in ms.
pub const TRACKPAD_MAX_GAP_MS: f64 = 200.0;

/// Callbacks for a single pointer gesture.
///
/// `C` is the context the handlers mutate (the canvas state). All methods
/// default to doing nothing.
pub trait GestureHandler<C> {
    /// Pointer released near where it was pressed, without dragging.
    fn on_click(&mut self, _ctx: &mut C, _event: &PointerEvent) {}

    /// Whether this gesture wants double-clicks reported separately. When
    /// false, a second quick click is reported through `on_click`.
    fn handles_double_click(&self) -> bool {
        false
    }

    /// Second click on the same spot within the double-click window.
    fn on_double_click(&mut self, _ctx: &mut C, _event: &PointerEvent) {}

    /// The press turned into a drag. `event` is `None` when the drag was
    /// detected only at release (the pointer teleported).
    fn on_drag_start(&mut self, _ctx: &mut C, _event: Option<&PointerEvent>) {}

    /// Pointer moved while dragging.
    fn on_drag(&mut self, _ctx: &mut C, _event: &PointerEvent) {}

    /// Drag finished.
    fn on_drag_end(&mut self, _ctx: &mut C, _event: &PointerEvent) {}

    /// Always runs once when the gesture ends, however it ends.
    fn finally(&mut self, _ctx: &mut C) {}
}

/// Dispatcher for the active gesture.
#[derive(Debug)]
pub struct CanvasPointer<H> {
    handler: Option<H>,
    down: Option<PointerEvent>,
    last_move: Option<PointerEvent>,
    /// Down event of the previous click, for double-click detection.
    last_click_down: Option<PointerEvent>,
    drag_started: bool,
    /// Corner being hovered or resized; drives the cursor glyph.
    pub resize_direction: Option<CompassCorner>,
    last_trackpad_ms: Option<f64>,
}

impl<H> Default for CanvasPointer<H> {
    fn default() -> Self {
        Self {
            handler: None,
            down: None,
            last_move: None,
            last_click_down: None,
            drag_started: false,
            resize_direction: None,
            last_trackpad_ms: None,
        }
    }
}

fn same_position(a: &PointerEvent, b: &PointerEvent, tolerance: f64) -> bool {
    (a.position - b.position).hypot2() <= tolerance * tolerance
}

impl<H> CanvasPointer<H> {
    /// Create an idle pointer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a gesture is in progress.
    pub fn is_down(&self) -> bool {
        self.down.is_some()
    }

    /// Whether the current gesture has become a drag.
    pub fn drag_started(&self) -> bool {
        self.drag_started
    }

    /// The pointer-down event of the current gesture.
    pub fn down_event(&self) -> Option<&PointerEvent> {
        self.down.as_ref()
    }

    /// The most recent move of the current gesture.
    pub fn last_move(&self) -> Option<&PointerEvent> {
        self.last_move.as_ref()
    }

    /// The active gesture's handler.
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// Mutable access to the active gesture's handler.
    pub fn handler_mut(&mut self) -> Option<&mut H> {
        self.handler.as_mut()
    }

    /// Classify a wheel event as trackpad or mouse wheel input.
    pub fn is_trackpad_gesture(&mut self, event: &WheelEvent) -> bool {
        let continuation = self
            .last_trackpad_ms
            .is_some_and(|last| event.timestamp_ms - last < TRACKPAD_MAX_GAP_MS);
        let small = event.delta.x.abs() < TRACKPAD_THRESHOLD && event.delta.y.abs() < TRACKPAD_THRESHOLD;
        let is_trackpad = continuation || small;
        self.last_trackpad_ms = is_trackpad.then_some(event.timestamp_ms);
        is_trackpad
    }
}

impl<H> CanvasPointer<H> {
    /// Start a new gesture. Any previous gesture is finalised first.
    pub fn down<C>(&mut self, event: PointerEvent, handler: H, ctx: &mut C)
    where
        H: GestureHandler<C>,
    {
        self.reset(ctx);
        log::debug!("gesture down at {:?}", event.position);
        self.down = Some(event);
        self.handler = Some(handler);
    }

    /// Feed a pointer move.
    pub fn move_to<C>(&mut self, event: &PointerEvent, ctx: &mut C)
    where
        H: GestureHandler<C>,
    {
        let Some(down) = self.down else {
            return;
        };
        if !event.is_primary || event.pointer_id != down.pointer_id {
            return;
        }

        if event.buttons == 0 {
            self.reset(ctx);
            return;
        }

        // Button released without an up event reaching us
        if event.buttons & down.buttons == 0 {
            self.complete_click(event, ctx);
            self.reset(ctx);
            return;
        }

        self.last_move = Some(*event);

        if !self.drag_started {
            let held_long = event.timestamp_ms - down.timestamp_ms > BUFFER_TIME_MS;
            if held_long || !same_position(event, &down, MAX_CLICK_DRIFT) {
                self.set_drag_started(Some(event), ctx);
            }
        }

        if self.drag_started {
            if let Some(handler) = self.handler.as_mut() {
                handler.on_drag(ctx, event);
            }
        }
    }

    /// Feed a pointer release. Returns true if the gesture was a click
    /// (including double-click) rather than a drag.
    pub fn up<C>(&mut self, event: &PointerEvent, ctx: &mut C) -> bool
    where
        H: GestureHandler<C>,
    {
        match self.down {
            Some(down) if down.button == event.button && event.pointer_id == down.pointer_id => {}
            _ => return false,
        }

        self.complete_click(event, ctx);
        let was_drag = self.drag_started;
        self.reset(ctx);
        !was_drag
    }

    /// Abort the current gesture. Only `finally` runs.
    pub fn cancel<C>(&mut self, ctx: &mut C)
    where
        H: GestureHandler<C>,
    {
        if self.down.is_some() {
            log::debug!("gesture cancelled");
        }
        self.reset(ctx);
    }

    /// Run `finally` for the current gesture and return to idle.
    pub fn reset<C>(&mut self, ctx: &mut C)
    where
        H: GestureHandler<C>,
    {
        if let Some(mut handler) = self.handler.take() {
            handler.finally(ctx);
        }
        self.down = None;
        self.last_move = None;
        self.drag_started = false;
        self.resize_direction = None;
    }

    fn set_drag_started<C>(&mut self, event: Option<&PointerEvent>, ctx: &mut C)
    where
        H: GestureHandler<C>,
    {
        self.drag_started = true;
        if let Some(handler) = self.handler.as_mut() {
            handler.on_drag_start(ctx, event);
        }
    }

    fn is_double_click(&self) -> bool {
        let (Some(down), Some(last)) = (self.down.as_ref(), self.last_click_down.as_ref()) else {
            return false;
        };
        let diff = down.timestamp_ms - last.timestamp_ms;
        diff > 0.0 && diff < DOUBLE_CLICK_TIME_MS && same_position(down, last, 3.0 * MAX_CLICK_DRIFT)
    }

    fn complete_click<C>(&mut self, event: &PointerEvent, ctx: &mut C)
    where
        H: GestureHandler<C>,
    {
        let Some(down) = self.down else {
            return;
        };

        if self.drag_started {
            if let Some(handler) = self.handler.as_mut() {
                handler.on_drag_end(ctx, event);
            }
        } else if !same_position(event, &down, MAX_CLICK_DRIFT) {
            // Moved without any move events (e.g. focus lost and regained)
            self.set_drag_started(None, ctx);
            if let Some(handler) = self.handler.as_mut() {
                handler.on_drag_end(ctx, event);
            }
        } else if self.handler.as_ref().is_some_and(|h| h.handles_double_click()) && self.is_double_click() {
            if let Some(handler) = self.handler.as_mut() {
                handler.on_double_click(ctx, event);
            }
            self.last_click_down = None;
        } else {
            if let Some(handler) = self.handler.as_mut() {
                handler.on_click(ctx, event);
            }
            self.last_click_down = Some(down);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerButton;
    use kurbo::{Point, Vec2};

    #[derive(Default)]
    struct Recorder {
        double: bool,
    }

    impl GestureHandler<Vec<&'static str>> for Recorder {
        fn on_click(&mut self, log: &mut Vec<&'static str>, _event: &PointerEvent) {
            log.push("click");
        }
        fn handles_double_click(&self) -> bool {
            self.double
        }
        fn on_double_click(&mut self, log: &mut Vec<&'static str>, _event: &PointerEvent) {
            log.push("double");
        }
        fn on_drag_start(&mut self, log: &mut Vec<&'static str>, _event: Option<&PointerEvent>) {
            log.push("drag_start");
        }
        fn on_drag(&mut self, log: &mut Vec<&'static str>, _event: &PointerEvent) {
            log.push("drag");
        }
        fn on_drag_end(&mut self, log: &mut Vec<&'static str>, _event: &PointerEvent) {
            log.push("drag_end");
        }
        fn finally(&mut self, log: &mut Vec<&'static str>) {
            log.push("finally");
        }
    }

    const PRIMARY: u8 = 1;

    fn down(x: f64, t: f64) -> PointerEvent {
        PointerEvent::down(Point::new(x, 0.0), PointerButton::Primary, t)
    }

    fn moved(x: f64, t: f64) -> PointerEvent {
        PointerEvent::moved(Point::new(x, 0.0), PRIMARY, t)
    }

    fn up(x: f64, t: f64) -> PointerEvent {
        PointerEvent::up(Point::new(x, 0.0), PointerButton::Primary, t)
    }

    #[test]
    fn test_click_without_drag() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        pointer.move_to(&moved(2.0, 20.0), &mut log);
        let was_click = pointer.up(&up(2.0, 40.0), &mut log);
        assert!(was_click);
        assert_eq!(log, vec!["click", "finally"]);
        assert!(!pointer.is_down());
    }

    #[test]
    fn test_drag_beyond_threshold() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        pointer.move_to(&moved(20.0, 10.0), &mut log);
        pointer.move_to(&moved(40.0, 20.0), &mut log);
        let was_click = pointer.up(&up(40.0, 30.0), &mut log);
        assert!(!was_click);
        assert_eq!(log, vec!["drag_start", "drag", "drag", "drag_end", "finally"]);
        assert!(!log.contains(&"click"));
    }

    #[test]
    fn test_long_press_becomes_drag() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        pointer.move_to(&moved(1.0, BUFFER_TIME_MS + 1.0), &mut log);
        assert!(pointer.drag_started());
        pointer.up(&up(1.0, 400.0), &mut log);
        assert_eq!(log, vec!["drag_start", "drag", "drag_end", "finally"]);
    }

    #[test]
    fn test_teleport_is_drag() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        let was_click = pointer.up(&up(100.0, 50.0), &mut log);
        assert!(!was_click);
        assert_eq!(log, vec!["drag_start", "drag_end", "finally"]);
    }

    #[test]
    fn test_double_click_suppresses_second_click() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder { double: true }, &mut log);
        pointer.up(&up(0.0, 50.0), &mut log);
        pointer.down(down(3.0, 200.0), Recorder { double: true }, &mut log);
        pointer.up(&up(3.0, 250.0), &mut log);
        assert_eq!(log, vec!["click", "finally", "double", "finally"]);

        // Third click starts over
        pointer.down(down(3.0, 300.0), Recorder { double: true }, &mut log);
        pointer.up(&up(3.0, 320.0), &mut log);
        assert_eq!(log.last(), Some(&"finally"));
        assert_eq!(log[log.len() - 2], "click");
    }

    #[test]
    fn test_slow_second_click_is_not_double() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder { double: true }, &mut log);
        pointer.up(&up(0.0, 10.0), &mut log);
        pointer.down(down(0.0, 0.0 + DOUBLE_CLICK_TIME_MS + 50.0), Recorder { double: true }, &mut log);
        pointer.up(&up(0.0, DOUBLE_CLICK_TIME_MS + 60.0), &mut log);
        assert_eq!(log, vec!["click", "finally", "click", "finally"]);
    }

    #[test]
    fn test_cancel_runs_finally_only() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        pointer.cancel(&mut log);
        assert_eq!(log, vec!["finally"]);
        // Nothing left to finalise
        pointer.cancel(&mut log);
        assert_eq!(log, vec!["finally"]);
    }

    #[test]
    fn test_new_down_finalises_previous() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        pointer.down(down(0.0, 10.0), Recorder::default(), &mut log);
        assert_eq!(log, vec!["finally"]);
    }

    #[test]
    fn test_released_button_during_move_completes() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        // Secondary held, primary released
        pointer.move_to(&PointerEvent::moved(Point::new(1.0, 0.0), 2, 20.0), &mut log);
        assert_eq!(log, vec!["click", "finally"]);
    }

    #[test]
    fn test_mismatched_button_up_is_ignored() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        let result = pointer.up(&PointerEvent::up(Point::ZERO, PointerButton::Secondary, 10.0), &mut log);
        assert!(!result);
        assert!(log.is_empty());
        assert!(pointer.is_down());
    }

    #[test]
    fn test_secondary_pointer_does_not_drive_gesture() {
        let mut log = Vec::new();
        let mut pointer = CanvasPointer::new();
        pointer.down(down(0.0, 0.0), Recorder::default(), &mut log);
        pointer.move_to(&moved(100.0, 10.0).with_pointer(2, false), &mut log);
        assert!(!pointer.drag_started());
        assert!(log.is_empty());
    }

    #[test]
    fn test_trackpad_detection() {
        let mut pointer: CanvasPointer<Recorder> = CanvasPointer::new();
        let wheel = WheelEvent::new(Point::ZERO, Vec2::new(0.0, 120.0), 0.0);
        assert!(!pointer.is_trackpad_gesture(&wheel));
        let pad = WheelEvent::new(Point::ZERO, Vec2::new(2.0, 4.0), 1000.0);
        assert!(pointer.is_trackpad_gesture(&pad));
        // Large delta shortly after a trackpad event continues the gesture
        let fling = WheelEvent::new(Point::ZERO, Vec2::new(0.0, 150.0), 1100.0);
        assert!(pointer.is_trackpad_gesture(&fling));
    }
}
