use serde::{Deserialize, Serialize};

use crate::tree::{CutTree, NodeKind};
use crate::waste::{area_of_kind, total_waste_area};

/// One row of the flat cutting table. `type` is the item id for items,
/// `-1` waste, `-2` branch and `-3` leftover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub plate_id: u32,
    pub node_id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub r#type: i64,
    pub cut: u8,
    pub parent: Option<u32>,
}

pub struct Solution {
    tree: CutTree,
}

impl Solution {
    pub(crate) fn new(tree: CutTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &CutTree {
        &self.tree
    }

    pub fn plate_count(&self) -> usize {
        self.tree.roots().len()
    }

    /// Id a following independent solve should start from.
    pub fn next_node_id(&self) -> u32 {
        self.tree.next_id()
    }

    /// Every node in plate order, each tree in pre-order.
    pub fn records(&self) -> Vec<NodeRecord> {
        let tree = &self.tree;
        tree.roots()
            .iter()
            .flat_map(|&root| tree.preorder(root))
            .map(|idx| {
                let node = tree.node(idx);
                NodeRecord {
                    plate_id: node.plate_id,
                    node_id: node.id,
                    x: node.rect.x,
                    y: node.rect.y,
                    width: node.rect.width,
                    height: node.rect.height,
                    r#type: node.kind.code(),
                    cut: node.depth,
                    parent: node.parent().map(|p| tree.node(p).id),
                }
            })
            .collect()
    }

    pub fn plate_area(&self) -> u64 {
        self.tree
            .roots()
            .iter()
            .map(|&root| self.tree.node(root).rect.area())
            .sum()
    }

    pub fn waste_area(&self) -> u64 {
        total_waste_area(&self.tree)
    }

    pub fn item_area(&self) -> u64 {
        self.sum_kind(|kind| matches!(kind, NodeKind::Item(_)))
    }

    pub fn leftover_area(&self) -> u64 {
        self.sum_kind(|kind| kind == NodeKind::Leftover)
    }

    fn sum_kind(&self, wanted: impl Fn(NodeKind) -> bool + Copy) -> u64 {
        self.tree
            .roots()
            .iter()
            .map(|&root| area_of_kind(&self.tree, root, wanted))
            .sum()
    }

    /// Waste as a share of the plate area actually consumed, leftover excluded.
    pub fn waste_percent(&self) -> f64 {
        let consumed = self.plate_area() - self.leftover_area();
        if consumed == 0 {
            return 0.0;
        }
        self.waste_area() as f64 / consumed as f64 * 100.0
    }

    /// Ids of 1-cut pieces wider than `max_1_cut`. The leftover is exempt.
    /// The engine does not enforce this limit; callers decide what to do.
    pub fn wide_first_cuts(&self, max_1_cut: u32) -> Vec<u32> {
        self.tree
            .nodes()
            .iter()
            .filter(|n| n.depth == 1 && n.kind != NodeKind::Leftover && n.rect.width > max_1_cut)
            .map(|n| n.id)
            .collect()
    }
}
