//! Arena-backed river tree.
//!
//! Each node owns one reach. Flow runs from child to parent: a node's last
//! coordinate coincides with its parent's first coordinate, and the root's
//! last coordinate is the outlet of the whole network. Nodes are addressed by
//! [`NodeId`]s that stay valid until the node itself is removed.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::ops::{coord_key, first, last, xy, Segment};
use crate::mesh_error::MeshError;
use geo::Coord;

/// Stable handle of a node inside a [`RiverTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
struct Node {
    segment: Segment,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A rooted tree of directed reaches.
#[derive(Debug, Clone, Default)]
pub struct RiverTree {
    nodes: Vec<Option<Node>>,
    root: Option<NodeId>,
    live: usize,
}

impl RiverTree {
    /// Tree holding a single root reach.
    pub fn new(root: Segment) -> Self {
        let mut tree = Self::default();
        tree.nodes.push(Some(Node {
            segment: root,
            parent: None,
            children: Vec::new(),
        }));
        tree.root = Some(NodeId(0));
        tree.live = 1;
        tree
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Attach a new reach as the last child of `parent`.
    ///
    /// Returns `None` if `parent` is not a live node.
    pub fn add_child(&mut self, parent: NodeId, segment: Segment) -> Option<NodeId> {
        self.node(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            segment,
            parent: Some(parent),
            children: Vec::new(),
        }));
        self.node_mut(parent)?.children.push(id);
        self.live += 1;
        Some(id)
    }

    pub fn segment(&self, id: NodeId) -> Option<&Segment> {
        self.node(id).map(|n| &n.segment)
    }

    /// Replace the reach of a node, returning the previous one.
    pub fn replace_segment(&mut self, id: NodeId, segment: Segment) -> Option<Segment> {
        self.node_mut(id)
            .map(|n| std::mem::replace(&mut n.segment, segment))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.children.is_empty())
    }

    /// Node ids in pre-order, children visited in insertion order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.live);
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Leaf ids in pre-order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.pre_order()
            .into_iter()
            .filter(|id| self.is_leaf(*id))
            .collect()
    }

    /// Reaches in pre-order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.pre_order()
            .into_iter()
            .filter_map(move |id| self.segment(id))
    }

    /// Overwrite the first coordinate of a node's reach.
    pub fn set_first_coord(&mut self, id: NodeId, c: Coord<f64>) {
        if let Some(n) = self.node_mut(id) {
            n.segment.0[0] = c;
        }
    }

    /// Overwrite the last coordinate of a node's reach.
    pub fn set_last_coord(&mut self, id: NodeId, c: Coord<f64>) {
        if let Some(n) = self.node_mut(id) {
            if let Some(end) = n.segment.0.last_mut() {
                *end = c;
            }
        }
    }

    /// Remove a leaf. Removing a leaf root empties the tree.
    ///
    /// Returns the removed reach, or `None` if `id` is not a live leaf.
    pub fn remove_leaf(&mut self, id: NodeId) -> Option<Segment> {
        if !self.is_leaf(id) {
            return None;
        }
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.live -= 1;
        match node.parent {
            Some(p) => {
                if let Some(parent) = self.node_mut(p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.root = None,
        }
        Some(node.segment)
    }

    /// Remove a non-root node, handing its children to its parent.
    ///
    /// The children are appended to the parent's child list in their current
    /// order. Coordinates are left untouched. Returns the removed reach, or
    /// `None` if `id` is the root or not live.
    pub fn collapse_into_parent(&mut self, id: NodeId) -> Option<Segment> {
        let parent = self.parent(id)?;
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.live -= 1;
        for child in &node.children {
            if let Some(c) = self.node_mut(*child) {
                c.parent = Some(parent);
            }
        }
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != id);
            p.children.extend(node.children.iter().copied());
        }
        Some(node.segment)
    }

    /// Outlet coordinate of the tree (last coordinate of the root reach).
    pub fn outlet(&self) -> Option<Coord<f64>> {
        self.root.and_then(|r| self.segment(r)).map(last)
    }

    /// Inlet coordinates of all leaves, in pre-order.
    pub fn inlets(&self) -> Vec<Coord<f64>> {
        self.leaves()
            .into_iter()
            .filter_map(|id| self.segment(id).map(first))
            .collect()
    }
}

impl DebugInvariants for RiverTree {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "RiverTree invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        let Some(root) = self.root else {
            return if self.live == 0 {
                Ok(())
            } else {
                Err(MeshError::TreeParentage(0))
            };
        };
        if self.parent(root).is_some() || !self.contains(root) {
            return Err(MeshError::TreeParentage(root.0));
        }
        let order = self.pre_order();
        if order.len() != self.live {
            return Err(MeshError::TreeParentage(root.0));
        }
        for id in order {
            let Some(node) = self.node(id) else {
                return Err(MeshError::TreeParentage(id.0));
            };
            if node.segment.0.len() < 2 {
                return Err(MeshError::DegenerateSegment(format!(
                    "reach {} has {} coordinates",
                    id.0,
                    node.segment.0.len()
                )));
            }
            for child in &node.children {
                let Some(c) = self.node(*child) else {
                    return Err(MeshError::TreeParentage(child.0));
                };
                if c.parent != Some(id) {
                    return Err(MeshError::TreeParentage(child.0));
                }
                if coord_key(last(&c.segment)) != coord_key(first(&node.segment)) {
                    log::debug!(
                        "reach {} ends at {:?}, parent {} starts at {:?}",
                        child.0,
                        xy(last(&c.segment)),
                        id.0,
                        xy(first(&node.segment))
                    );
                    return Err(MeshError::TreeConnectivity {
                        node: child.0,
                        parent: id.0,
                    });
                }
            }
        }
        Ok(())
    }
}
