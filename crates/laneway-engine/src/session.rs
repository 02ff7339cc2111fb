//! Tool-facing edit session.
//!
//! A session pins one node, keeps a live connection view for the tool and
//! renderer, and funnels every request through the command buffer. The
//! view is re-derived after each applied batch so the tool always renders
//! the post-mutation state. Dirtiness accumulates across the session and
//! is handed back on `finish` for the recompute loop.

use laneway_core::{LaneEnd, LaneOverrides, NodeId, RoadNetwork};

use crate::apply::{apply_and_mark, request_add, request_remove, request_reset, RequestModifiers};
use crate::commands::CommandBuffer;
use crate::connections::{generate_connections, ConnectionView};
use crate::connectors::{generate_connectors, Connector};
use crate::dirty::DirtySet;
use crate::error::EngineError;
use crate::routing::rebuild_node_lanes;

pub struct EditSession<'a> {
    net: &'a mut RoadNetwork,
    overrides: &'a mut LaneOverrides,
    node: NodeId,
    view: ConnectionView,
    dirty: DirtySet,
}

impl<'a> EditSession<'a> {
    /// Opens a session on `node`, materializing its lanes and view.
    pub fn begin(
        net: &'a mut RoadNetwork,
        overrides: &'a mut LaneOverrides,
        node: NodeId,
    ) -> Result<Self, EngineError> {
        rebuild_node_lanes(net, overrides, node)?;
        let connectors = generate_connectors(net, node)?;
        let view = generate_connections(net, overrides, node, connectors)?;
        Ok(EditSession {
            net,
            overrides,
            node,
            view,
            dirty: DirtySet::new(),
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn view(&self) -> &ConnectionView {
        &self.view
    }

    pub fn connectors(&self) -> &[Connector] {
        self.view.connectors()
    }

    pub fn is_overridden(&self, end: LaneEnd) -> bool {
        self.view.is_overridden(end)
    }

    /// Adds `source -> target`. Returns the mutations applied.
    pub fn request_add(
        &mut self,
        source: LaneEnd,
        target: LaneEnd,
        modifiers: RequestModifiers,
    ) -> Result<usize, EngineError> {
        let mut buffer = CommandBuffer::new();
        request_add(self.net, self.node, source, target, modifiers, &mut buffer)?;
        self.apply(buffer)
    }

    /// Removes `source -> target`. A missing triple applies as zero
    /// mutations.
    pub fn request_remove(
        &mut self,
        source: LaneEnd,
        target: LaneEnd,
    ) -> Result<usize, EngineError> {
        let mut buffer = CommandBuffer::new();
        request_remove(self.net, self.node, source, target, &mut buffer)?;
        self.apply(buffer)
    }

    /// Drops every override of the session node.
    pub fn reset_all(&mut self) -> Result<usize, EngineError> {
        let mut buffer = CommandBuffer::new();
        request_reset(self.node, &mut buffer);
        self.apply(buffer)
    }

    /// Ends the session, yielding the accumulated recompute set.
    pub fn finish(self) -> DirtySet {
        self.dirty
    }

    fn apply(&mut self, mut buffer: CommandBuffer) -> Result<usize, EngineError> {
        let mutations = apply_and_mark(self.net, self.overrides, &mut buffer, &mut self.dirty);
        if mutations > 0 {
            self.refresh()?;
        }
        Ok(mutations)
    }

    fn refresh(&mut self) -> Result<(), EngineError> {
        rebuild_node_lanes(self.net, self.overrides, self.node)?;
        let connectors = generate_connectors(self.net, self.node)?;
        self.view = generate_connections(self.net, self.overrides, self.node, connectors)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use laneway_core::{EdgeId, LaneComposition};

    fn junction() -> (RoadNetwork, NodeId, Vec<EdgeId>) {
        let mut net = RoadNetwork::new();
        let center = net.add_node(Vec3::ZERO);
        let south = net.add_node(Vec3::new(0.0, 0.0, -60.0));
        let north = net.add_node(Vec3::new(0.0, 0.0, 60.0));
        let east = net.add_node(Vec3::new(60.0, 0.0, 0.0));
        let edges = vec![
            net.add_edge(south, center, LaneComposition::two_way(1))
                .unwrap(),
            net.add_edge(center, north, LaneComposition::two_way(1))
                .unwrap(),
            net.add_edge(center, east, LaneComposition::two_way(1))
                .unwrap(),
        ];
        (net, center, edges)
    }

    #[test]
    fn session_view_tracks_each_request() {
        let (mut net, center, edges) = junction();
        let mut overrides = LaneOverrides::new();
        let mut session = EditSession::begin(&mut net, &mut overrides, center).unwrap();
        let source = LaneEnd::new(edges[0], 1);
        let target = LaneEnd::new(edges[2], 1);
        assert_eq!(session.view().connection_count(), 6);
        assert!(!session.is_overridden(source));

        let mutations = session
            .request_add(source, target, RequestModifiers::default())
            .unwrap();
        assert_eq!(mutations, 2);
        assert!(session.is_overridden(source));
        // The overridden lane end now shows exactly its stored connection.
        assert_eq!(session.view().connections_from(source).len(), 1);
        assert!(session.view().has_connection(source, target));
        assert_eq!(session.view().connection_count(), 5);

        assert_eq!(session.request_remove(source, target).unwrap(), 1);
        // Entry and empty holder remain; the view still marks the end.
        assert!(session.is_overridden(source));
        assert!(session.view().connections_from(source).is_empty());

        assert!(session.reset_all().unwrap() >= 1);
        assert!(!session.is_overridden(source));
        assert_eq!(session.view().connection_count(), 6);

        let dirty = session.finish();
        assert!(dirty.contains_node(center));
        assert!(dirty.contains_edge(edges[0]));
    }

    #[test]
    fn redundant_requests_do_not_touch_the_container() {
        let (mut net, center, edges) = junction();
        let mut overrides = LaneOverrides::new();
        let mut session = EditSession::begin(&mut net, &mut overrides, center).unwrap();
        let source = LaneEnd::new(edges[0], 1);
        let target = LaneEnd::new(edges[1], 1);
        session
            .request_add(source, target, RequestModifiers::default())
            .unwrap();
        assert_eq!(
            session
                .request_add(source, target, RequestModifiers::default())
                .unwrap(),
            0
        );
        assert_eq!(
            session
                .request_remove(LaneEnd::new(edges[1], 0), target)
                .unwrap(),
            0
        );
    }
}
