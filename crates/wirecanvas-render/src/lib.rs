//! WireCanvas Render Library
//!
//! Turns canvas state into draw calls. `FramePainter` walks the graph in
//! layer order and talks to a backend through the `Painter` trait. The
//! default backend uses Vello; `RecordingRenderer` captures draw commands
//! for headless use and tests.

mod painter;
mod recording;
mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use painter::{FramePainter, FrameStats, Layer};
pub use recording::{DrawCommand, RecordingPainter, RecordingRenderer};
pub use renderer::{
    parse_color, GridStyle, Painter, RenderContext, RenderResult, Renderer, RendererError,
};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;
