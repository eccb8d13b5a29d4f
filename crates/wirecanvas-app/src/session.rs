//! Headless scripted sessions.
//!
//! A session is a list of input steps replayed against a canvas, followed
//! by one recorded frame. Used for smoke-testing the engine without a GPU.

use std::fmt;

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use wirecanvas_core::graph::{Group, Node, Widget};
use wirecanvas_core::{
    Canvas, CanvasEvent, Graph, Key, KeyEvent, Modifiers, PointerButton, PointerEvent, WheelEvent,
};
use wirecanvas_render::{RecordingRenderer, RenderContext, Renderer};

/// One scripted input. Positions are in screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Down {
        x: f64,
        y: f64,
        #[serde(default)]
        button: PointerButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Move {
        x: f64,
        y: f64,
    },
    Up {
        x: f64,
        y: f64,
        #[serde(default)]
        button: PointerButton,
    },
    Wheel {
        x: f64,
        y: f64,
        dy: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Key {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Let time pass, e.g. to separate two clicks.
    Wait { ms: f64 },
}

fn default_width() -> f64 {
    1280.0
}

fn default_height() -> f64 {
    800.0
}

fn default_step_ms() -> f64 {
    16.0
}

/// A scripted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// Time between steps.
    #[serde(default = "default_step_ms")]
    pub step_ms: f64,
    pub steps: Vec<Step>,
}

/// What a session left behind.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub steps: usize,
    pub nodes: usize,
    pub links: usize,
    pub selected: usize,
    pub events: Vec<CanvasEvent>,
    pub draw_commands: usize,
    pub drawn_nodes: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "steps:         {}", self.steps)?;
        writeln!(f, "nodes:         {} ({} drawn)", self.nodes, self.drawn_nodes)?;
        writeln!(f, "links:         {}", self.links)?;
        writeln!(f, "selected:      {}", self.selected)?;
        writeln!(f, "draw commands: {}", self.draw_commands)?;
        write!(f, "events:        {}", self.events.len())?;
        for event in &self.events {
            write!(f, "\n  {event:?}")?;
        }
        Ok(())
    }
}

/// Replay `session` against `canvas` and record one frame.
pub fn run_session(canvas: &mut Canvas, session: &Session) -> SessionSummary {
    let mut now = 0.0;
    let mut cursor = Point::ZERO;
    let mut buttons = 0u8;
    let mut modifiers = Modifiers::NONE;
    let mut events = Vec::new();
    canvas.viewport_size = Size::new(session.width, session.height);

    for step in &session.steps {
        now += session.step_ms;
        match *step {
            Step::Down { x, y, button, modifiers: mods } => {
                cursor = Point::new(x, y);
                modifiers = mods;
                buttons |= button.mask();
                let event = PointerEvent::down(cursor, button, now).with_modifiers(modifiers);
                canvas.process_pointer_down(PointerEvent { buttons, ..event });
            }
            Step::Move { x, y } => {
                cursor = Point::new(x, y);
                canvas.process_pointer_move(PointerEvent::moved(cursor, buttons, now).with_modifiers(modifiers));
            }
            Step::Up { x, y, button } => {
                cursor = Point::new(x, y);
                buttons &= !button.mask();
                canvas.process_pointer_up(PointerEvent::up(cursor, button, now).with_modifiers(modifiers));
                modifiers = Modifiers::NONE;
            }
            Step::Wheel { x, y, dy, modifiers: mods } => {
                let mut event = WheelEvent::new(Point::new(x, y), Vec2::new(0.0, dy), now);
                event.modifiers = mods;
                canvas.process_wheel(&event);
            }
            Step::Key { key, modifiers: mods } => {
                canvas.process_key(&KeyEvent::pressed(key, mods));
                canvas.process_key(&KeyEvent::released(key, mods));
            }
            Step::Wait { ms } => now += ms,
        }
        canvas.tick(now);
        events.extend(canvas.take_events());
    }

    let size = Size::new(session.width, session.height);
    canvas.prepare_frame(size);
    let mut renderer = RecordingRenderer::new();
    renderer.build_scene(&RenderContext::new(canvas, size));
    log::info!("session finished after {} steps", session.steps.len());

    SessionSummary {
        steps: session.steps.len(),
        nodes: canvas.graph().map_or(0, Graph::node_count),
        links: canvas.graph().map_or(0, Graph::link_count),
        selected: canvas.selection.len(),
        events,
        draw_commands: renderer.commands().len(),
        drawn_nodes: renderer.last_stats().nodes,
    }
}

/// A small graph to open when none is given.
pub fn demo_graph() -> Graph {
    let mut graph = Graph::new();
    let number = graph.add_node(
        Node::new("math/number")
            .with_title("Number")
            .with_pos(80.0, 120.0)
            .with_size(160.0, 60.0)
            .with_output("value", "number")
            .with_widget(Widget::new("value", 30.0)),
    );
    let add = graph.add_node(
        Node::new("math/add")
            .with_title("Add")
            .with_pos(360.0, 100.0)
            .with_size(160.0, 70.0)
            .with_input("a", "number")
            .with_input("b", "number")
            .with_output("sum", "number"),
    );
    let watch = graph.add_node(
        Node::new("basic/watch")
            .with_title("Watch")
            .with_pos(640.0, 140.0)
            .with_size(140.0, 50.0)
            .with_input("value", "*"),
    );
    graph.connect(number, 0, add, 0, None);
    graph.connect(number, 0, add, 1, None);
    graph.connect(add, 0, watch, 0, None);
    graph.add_group(Group::new("Math", Rect::new(40.0, 20.0, 560.0, 240.0)));
    graph
}

/// Drag a node, rubber-band everything, copy and paste it.
pub fn demo_session() -> Session {
    Session {
        width: default_width(),
        height: default_height(),
        step_ms: default_step_ms(),
        steps: vec![
            Step::Down { x: 700.0, y: 150.0, button: PointerButton::Primary, modifiers: Modifiers::NONE },
            Step::Move { x: 720.0, y: 170.0 },
            Step::Move { x: 760.0, y: 200.0 },
            Step::Up { x: 760.0, y: 200.0, button: PointerButton::Primary },
            Step::Down { x: 10.0, y: 10.0, button: PointerButton::Primary, modifiers: Modifiers::CTRL },
            Step::Move { x: 500.0, y: 400.0 },
            Step::Move { x: 1000.0, y: 600.0 },
            Step::Up { x: 1000.0, y: 600.0, button: PointerButton::Primary },
            Step::Key { key: Key::Character('c'), modifiers: Modifiers::CTRL },
            Step::Move { x: 200.0, y: 500.0 },
            Step::Key { key: Key::Character('v'), modifiers: Modifiers::CTRL },
            Step::Wheel { x: 640.0, y: 400.0, dy: 120.0, modifiers: Modifiers::NONE },
        ],
    }
}
