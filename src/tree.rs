use serde::{Deserialize, Serialize};

use crate::level::CutLevel;
use crate::plates::Plate;
use crate::residual::Residual;
use crate::types::Rect;

pub type NodeIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Branch,
    Item(u32),
    Waste,
    /// Unused end of the last plate.
    Leftover,
}

impl NodeKind {
    /// Numeric `TYPE` code of the solution table.
    pub fn code(&self) -> i64 {
        match self {
            NodeKind::Item(id) => *id as i64,
            NodeKind::Waste => -1,
            NodeKind::Branch => -2,
            NodeKind::Leftover => -3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: u32,
    pub plate_id: u32,
    pub rect: Rect,
    pub kind: NodeKind,
    /// Number of guillotine passes that produced this rectangle, 0 for a plate.
    pub depth: u8,
    parent: Option<NodeIdx>,
    children: Vec<NodeIdx>,
    residual: Residual,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }

    pub fn children(&self) -> &[NodeIdx] {
        &self.children
    }

    pub fn residual(&self) -> &Residual {
        &self.residual
    }

    /// The cut applied to this node's residual, `None` below the trim level.
    pub fn level(&self) -> Option<CutLevel> {
        CutLevel::from_depth(self.depth)
    }
}

enum Undo {
    Residual(NodeIdx, Residual),
    Kind(NodeIdx, NodeKind),
    Child(NodeIdx),
}

#[must_use = "a checkpoint must be rolled back or committed"]
#[derive(Debug)]
pub struct Checkpoint {
    nodes: usize,
    roots: usize,
    journal: usize,
}

/// Node ids are `first_id + index`, so truncating the arena rewinds them.
/// While a checkpoint is open every change to an existing node is journaled
/// so rollback can undo it.
pub struct CutTree {
    nodes: Vec<Node>,
    roots: Vec<NodeIdx>,
    first_id: u32,
    journal: Vec<Undo>,
    open_checkpoints: usize,
}

impl CutTree {
    pub fn new(first_id: u32) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            first_id,
            journal: Vec::new(),
            open_checkpoints: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first_id(&self) -> u32 {
        self.first_id
    }

    pub fn next_id(&self) -> u32 {
        self.first_id + self.nodes.len() as u32
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn roots(&self) -> &[NodeIdx] {
        &self.roots
    }

    pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.nodes[idx].parent
    }

    pub fn residual(&self, idx: NodeIdx) -> &Residual {
        &self.nodes[idx].residual
    }

    pub fn root_of(&self, mut idx: NodeIdx) -> NodeIdx {
        while let Some(parent) = self.nodes[idx].parent {
            idx = parent;
        }
        idx
    }

    pub fn ancestry(&self, idx: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
        std::iter::successors(Some(idx), move |&i| self.nodes[i].parent)
    }

    pub fn preorder(&self, root: NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::new();
        let mut pending = vec![root];
        while let Some(idx) = pending.pop() {
            order.push(idx);
            pending.extend(self.nodes[idx].children.iter().rev());
        }
        order
    }

    pub fn add_root(&mut self, plate: &Plate) -> NodeIdx {
        let rect = Rect::new(0, 0, plate.width, plate.height);
        let idx = self.nodes.len();
        self.nodes.push(Node {
            id: self.next_id(),
            plate_id: plate.id,
            rect,
            kind: NodeKind::Branch,
            depth: 0,
            parent: None,
            children: Vec::new(),
            residual: Residual::new(rect, &plate.defects),
        });
        self.roots.push(idx);
        idx
    }

    fn push_child(&mut self, parent: NodeIdx, residual: Residual) -> NodeIdx {
        let idx = self.nodes.len();
        let (plate_id, depth) = (self.nodes[parent].plate_id, self.nodes[parent].depth + 1);
        self.nodes.push(Node {
            id: self.next_id(),
            plate_id,
            rect: residual.rect(),
            kind: NodeKind::Branch,
            depth,
            parent: Some(parent),
            children: Vec::new(),
            residual,
        });
        self.record(Undo::Child(parent));
        self.nodes[parent].children.push(idx);
        idx
    }

    fn replace_residual(&mut self, idx: NodeIdx, residual: Residual) {
        let previous = std::mem::replace(&mut self.nodes[idx].residual, residual);
        self.record(Undo::Residual(idx, previous));
    }

    /// Gives a branch node its final role. Happens at most once per node.
    pub fn set_kind(&mut self, idx: NodeIdx, kind: NodeKind) {
        let previous = self.nodes[idx].kind;
        assert_eq!(
            previous,
            NodeKind::Branch,
            "node {} already finalized",
            self.nodes[idx].id
        );
        self.nodes[idx].kind = kind;
        self.record(Undo::Kind(idx, previous));
    }

    /// Cuts the residual of `idx` at `x`; the left part becomes a new child.
    pub fn cut_vertical(&mut self, idx: NodeIdx, x: u32) -> NodeIdx {
        let (left, right) = self.nodes[idx].residual.split_vertical(x);
        self.replace_residual(idx, right);
        self.push_child(idx, left)
    }

    pub fn cut_horizontal(&mut self, idx: NodeIdx, y: u32) -> NodeIdx {
        let (below, above) = self.nodes[idx].residual.split_horizontal(y);
        self.replace_residual(idx, above);
        self.push_child(idx, below)
    }

    /// Moves the whole residual of `idx` into a new branch child one level deeper.
    pub fn open_remainder(&mut self, idx: NodeIdx) -> NodeIdx {
        let (whole, rest) = self.nodes[idx].residual.take();
        self.replace_residual(idx, rest);
        self.push_child(idx, whole)
    }

    /// Turns the remaining residual of `idx` into a finished child of `kind`.
    /// Nothing is created for an exhausted residual.
    pub fn close_remainder(&mut self, idx: NodeIdx, kind: NodeKind) -> Option<NodeIdx> {
        if self.nodes[idx].residual.is_empty() {
            return None;
        }
        let child = self.open_remainder(idx);
        self.set_kind(child, kind);
        Some(child)
    }

    /// Finalizes an untouched branch node as a whole, without children.
    pub fn finalize(&mut self, idx: NodeIdx, kind: NodeKind) {
        let node = &self.nodes[idx];
        assert!(
            node.children.is_empty() && node.residual.rect() == node.rect,
            "node {} was already cut",
            node.id
        );
        let rest = Residual::exhausted(node.rect.right(), node.rect.top());
        self.replace_residual(idx, rest);
        self.set_kind(idx, kind);
    }

    fn record(&mut self, undo: Undo) {
        if self.open_checkpoints > 0 {
            self.journal.push(undo);
        }
    }

    pub fn checkpoint(&mut self) -> Checkpoint {
        self.open_checkpoints += 1;
        Checkpoint {
            nodes: self.nodes.len(),
            roots: self.roots.len(),
            journal: self.journal.len(),
        }
    }

    /// Undoes everything since `checkpoint`, including the ids handed out.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        assert!(
            self.open_checkpoints > 0 && self.journal.len() >= checkpoint.journal,
            "checkpoint rolled back out of order"
        );
        while self.journal.len() > checkpoint.journal {
            match self.journal.pop() {
                Some(Undo::Residual(idx, residual)) => self.nodes[idx].residual = residual,
                Some(Undo::Kind(idx, kind)) => self.nodes[idx].kind = kind,
                Some(Undo::Child(idx)) => {
                    self.nodes[idx].children.pop();
                }
                None => break,
            }
        }
        self.nodes.truncate(checkpoint.nodes);
        self.roots.truncate(checkpoint.roots);
        self.close_checkpoint();
    }

    pub fn commit(&mut self, checkpoint: Checkpoint) {
        assert!(
            self.journal.len() >= checkpoint.journal,
            "checkpoint committed out of order"
        );
        self.close_checkpoint();
    }

    fn close_checkpoint(&mut self) {
        self.open_checkpoints -= 1;
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Defect;

    fn plate(id: u32, w: u32, h: u32) -> Plate {
        Plate::new(id, w, h, vec![])
    }

    #[test]
    fn test_root_spans_plate() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&Plate::new(3, 600, 300, vec![Defect::new(0, 1, 1, 2, 2)]));
        let node = tree.node(root);
        assert!(node.is_root());
        assert_eq!(node.plate_id, 3);
        assert_eq!(node.rect, Rect::new(0, 0, 600, 300));
        assert_eq!(node.residual().defects().len(), 1);
        assert_eq!(node.level(), Some(CutLevel::First));
        assert_eq!(tree.roots(), &[root]);
    }

    #[test]
    fn test_cuts_create_children_and_shrink_residual() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let left = tree.cut_vertical(root, 200);
        assert_eq!(tree.node(left).rect, Rect::new(0, 0, 200, 300));
        assert_eq!(tree.node(left).depth, 1);
        assert_eq!(tree.residual(root).rect(), Rect::new(200, 0, 400, 300));
        let low = tree.cut_horizontal(left, 100);
        assert_eq!(tree.node(low).rect, Rect::new(0, 0, 200, 100));
        assert_eq!(tree.parent(low), Some(left));
        assert_eq!(tree.root_of(low), root);
        assert_eq!(tree.ancestry(low).collect::<Vec<_>>(), vec![low, left, root]);
    }

    #[test]
    fn test_ids_are_contiguous_from_first_id() {
        let mut tree = CutTree::new(40);
        let root = tree.add_root(&plate(0, 600, 300));
        let a = tree.cut_vertical(root, 100);
        let b = tree.cut_vertical(root, 300);
        assert_eq!(tree.node(root).id, 40);
        assert_eq!(tree.node(a).id, 41);
        assert_eq!(tree.node(b).id, 42);
        assert_eq!(tree.next_id(), 43);
    }

    #[test]
    fn test_close_remainder_skips_empty_residual() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let waste = tree.close_remainder(root, NodeKind::Waste);
        assert!(waste.is_some());
        assert!(tree.residual(root).is_empty());
        assert_eq!(tree.close_remainder(root, NodeKind::Waste), None);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_preorder_visits_parent_first() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let a = tree.cut_vertical(root, 100);
        let a1 = tree.cut_horizontal(a, 100);
        let b = tree.cut_vertical(root, 300);
        assert_eq!(tree.preorder(root), vec![root, a, a1, b]);
    }

    #[test]
    #[should_panic(expected = "already finalized")]
    fn test_kind_is_written_once() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let child = tree.cut_vertical(root, 100);
        tree.set_kind(child, NodeKind::Waste);
        tree.set_kind(child, NodeKind::Item(1));
    }

    #[test]
    fn test_rollback_restores_tree_and_ids() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let first = tree.cut_vertical(root, 100);
        tree.set_kind(first, NodeKind::Waste);
        let before = tree.residual(root).clone();

        let cp = tree.checkpoint();
        let col = tree.cut_vertical(root, 250);
        tree.close_remainder(col, NodeKind::Waste);
        tree.add_root(&plate(1, 600, 300));
        assert_eq!(tree.len(), 5);
        tree.rollback(cp);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.roots(), &[root]);
        assert_eq!(tree.node(root).children(), &[first]);
        assert_eq!(tree.residual(root), &before);
        assert_eq!(tree.next_id(), 2);
    }

    #[test]
    fn test_nested_rollback_inside_commit() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let outer = tree.checkpoint();
        let kept = tree.cut_vertical(root, 100);
        let inner = tree.checkpoint();
        tree.cut_vertical(root, 200);
        tree.rollback(inner);
        tree.commit(outer);
        assert_eq!(tree.node(root).children(), &[kept]);
        assert_eq!(tree.residual(root).x(), 100);
    }

    #[test]
    fn test_outer_rollback_undoes_inner_commit() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let outer = tree.checkpoint();
        let inner = tree.checkpoint();
        let child = tree.cut_vertical(root, 200);
        tree.set_kind(child, NodeKind::Item(9));
        tree.commit(inner);
        tree.rollback(outer);
        assert!(tree.node(root).children().is_empty());
        assert_eq!(tree.residual(root).width(), 600);
    }

    #[test]
    fn test_finalize_whole_node() {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&plate(0, 600, 300));
        let col = tree.cut_vertical(root, 100);
        tree.finalize(col, NodeKind::Item(5));
        assert_eq!(tree.node(col).kind, NodeKind::Item(5));
        assert!(tree.residual(col).is_empty());
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(NodeKind::Item(12).code(), 12);
        assert_eq!(NodeKind::Waste.code(), -1);
        assert_eq!(NodeKind::Branch.code(), -2);
        assert_eq!(NodeKind::Leftover.code(), -3);
    }
}
