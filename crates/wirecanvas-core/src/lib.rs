//! WireCanvas Core Library
//!
//! Platform-agnostic interaction engine for a node-graph editor canvas:
//! graph model, hit testing, pointer gestures, link dragging, selection,
//! clipboard and viewport.

pub mod canvas;
pub mod clipboard;
pub mod config;
pub mod graph;
pub mod input;
pub mod link_connector;
pub mod link_geometry;
pub mod measure;
pub mod pointer;
pub mod selection;
pub mod viewport;

pub use canvas::{Canvas, CanvasError, CanvasEvent, CanvasListener, CanvasResult, CanvasState, Interaction};
pub use clipboard::{ClipboardError, ClipboardItems, ClipboardStore, MemoryClipboard, CLIPBOARD_KEY};
pub use config::{CanvasConfig, ConfigError, NavigationMode};
pub use graph::{Graph, GroupId, ItemId, LinkId, NodeId, NodeTypeRegistry, RerouteId, SegmentId, SubgraphId};
pub use hit_test::{hit_test, HitTarget};
pub use input::{Key, KeyEvent, Modifiers, PointerButton, PointerEvent, WheelEvent};
pub use link_connector::{ConnectorDrop, LinkConnector};
pub use link_geometry::{LinkLayout, LinkRenderMode, RenderedSegment};
pub use measure::{snap_to_grid, CompassCorner, LinkDirection};
pub use pointer::{CanvasPointer, GestureHandler};
pub use selection::Selection;
pub use viewport::{AnimationOptions, Easing, Viewport};
