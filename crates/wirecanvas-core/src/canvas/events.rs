//! Canvas lifecycle events.

use crate::graph::{GroupId, NodeId, SegmentId, SubgraphId};
use crate::link_connector::RenderLink;
use kurbo::Point;

/// Something the host application may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// The active graph changed. `None` is the root graph.
    GraphSwitched { subgraph: Option<SubgraphId> },
    /// Outermost edit transaction started.
    BeforeChange,
    /// Outermost edit transaction finished.
    AfterChange,
    /// A new link was released over empty canvas.
    EmptyRelease { pos: Point, from: RenderLink },
    EmptyDoubleClick { pos: Point },
    NodeDoubleClick { node: NodeId },
    GroupDoubleClick { group: GroupId },
    /// Delete was requested with nothing selected.
    NoItemsSelected,
    /// About to enter a subgraph. A listener may cancel this.
    SubgraphOpening { subgraph: SubgraphId, node: Option<NodeId> },
    SubgraphOpened { subgraph: SubgraphId },
    LinkMenuRequested { segment: SegmentId, pos: Point },
    WidgetClicked { node: NodeId, widget: usize },
}

impl CanvasEvent {
    /// Whether a listener returning `false` stops the action.
    pub fn is_cancelable(&self) -> bool {
        matches!(self, CanvasEvent::SubgraphOpening { .. })
    }
}

/// Receives canvas events as they happen.
pub trait CanvasListener {
    /// Handle `event`. Returning `false` cancels a cancelable event and is
    /// ignored otherwise.
    fn on_event(&mut self, event: &CanvasEvent) -> bool;
}

impl<F> CanvasListener for F
where
    F: FnMut(&CanvasEvent) -> bool,
{
    fn on_event(&mut self, event: &CanvasEvent) -> bool {
        self(event)
    }
}
