use crate::config::Constraints;
use crate::level::CutLevel;
use crate::residual::Residual;
use crate::tree::{CutTree, NodeIdx, NodeKind};
use crate::types::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Placed(NodeIdx),
    /// The plate cannot take the item. Carries the plate's root.
    Failed(NodeIdx),
}

enum Step {
    Descend(NodeIdx),
    Placed(NodeIdx),
    Failed(NodeIdx),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrimSide {
    Low,
    High,
}

/// Places `item` starting from the residual of `start`. Waste cut off on the
/// way is kept even when the item ends up failing.
pub fn place(
    tree: &mut CutTree,
    constraints: &Constraints,
    item: &Item,
    start: NodeIdx,
) -> PlaceOutcome {
    let mut cutter = Cutter { tree, constraints };
    let mut node = start;
    loop {
        match cutter.step(item, node) {
            Step::Descend(next) => node = next,
            Step::Placed(next) => return PlaceOutcome::Placed(next),
            Step::Failed(root) => return PlaceOutcome::Failed(root),
        }
    }
}

/// Closes the plate holding `last` once no more items will go on it.
/// Residuals on the way up become waste; the root's own becomes leftover.
pub fn finish_plate(tree: &mut CutTree, last: NodeIdx) {
    let mut node = last;
    while let Some(parent) = tree.parent(node) {
        tree.close_remainder(node, NodeKind::Waste);
        node = parent;
    }
    tree.close_remainder(node, NodeKind::Leftover);
}

/// After a waste column is cut off at `cut`, the strip left over must either
/// take the item exactly or be wide enough to stand as waste on its own.
///
/// The rest is compared against the item's width, the dimension running
/// across the cut.
fn leaves_usable_strip(right: u32, cut: u32, item_width: u32, min_waste: u32) -> bool {
    match right.checked_sub(cut) {
        Some(rest) => rest == item_width || rest >= min_waste,
        None => false,
    }
}

struct Cutter<'a> {
    tree: &'a mut CutTree,
    constraints: &'a Constraints,
}

impl Cutter<'_> {
    fn step(&mut self, item: &Item, node: NodeIdx) -> Step {
        let Some(level) = self.tree.node(node).level() else {
            unreachable!("node {} is below the trim level", self.tree.node(node).id);
        };
        let residual = self.tree.residual(node).clone();
        let Some((x, y)) = residual.find_place(item.width, item.length, level.is_vertical()) else {
            self.tree.close_remainder(node, NodeKind::Waste);
            return self.retreat(node);
        };
        match level {
            CutLevel::First => self.strip_cut(item, node, &residual, x, level),
            CutLevel::Second => self.strip_cut(item, node, &residual, y, level),
            CutLevel::Third => self.third_cut(item, node, &residual, x),
            CutLevel::Trim => self.trim(item, node, &residual),
        }
    }

    fn retreat(&self, node: NodeIdx) -> Step {
        match self.tree.parent(node) {
            Some(parent) => Step::Descend(parent),
            None => Step::Failed(node),
        }
    }

    fn climb(&self, from: NodeIdx) -> Step {
        let mut node = from;
        while self.tree.residual(node).is_empty() {
            match self.tree.parent(node) {
                Some(parent) => node = parent,
                None => return Step::Failed(node),
            }
        }
        Step::Descend(node)
    }

    fn placed_above(&self, node: NodeIdx) -> Step {
        Step::Placed(self.tree.parent(node).unwrap_or(node))
    }

    fn cut(&mut self, node: NodeIdx, at: u32, vertical: bool) -> NodeIdx {
        if vertical {
            self.tree.cut_vertical(node, at)
        } else {
            self.tree.cut_horizontal(node, at)
        }
    }

    fn commit_if_exact(&mut self, item: &Item, node: NodeIdx, child: NodeIdx) -> Step {
        let rect = self.tree.node(child).rect;
        if rect.width == item.width && rect.height == item.length {
            self.tree.set_kind(child, NodeKind::Item(item.id));
            return Step::Placed(node);
        }
        Step::Descend(child)
    }

    /// 1-cuts and 2-cuts: strips across the whole residual, spaced at least
    /// the level's minimum apart. `at` is the item's position along the cut
    /// axis.
    fn strip_cut(
        &mut self,
        item: &Item,
        node: NodeIdx,
        r: &Residual,
        at: u32,
        level: CutLevel,
    ) -> Step {
        let vertical = level.is_vertical();
        let (start, end, extent) = if vertical {
            (r.x(), r.right(), item.width)
        } else {
            (r.y(), r.top(), item.length)
        };
        let next_cut = |from: u32| {
            if vertical {
                r.next_cut_x(from)
            } else {
                r.next_cut_y(from)
            }
        };
        let spacing = level.min_spacing(self.constraints).unwrap_or(0);
        let min_waste = self.constraints.min_waste;

        if at != start {
            let cut = next_cut(if at - start < spacing {
                start + spacing
            } else {
                at
            });
            if end < cut + min_waste {
                return Step::Descend(self.tree.open_remainder(node));
            }
            let waste = self.cut(node, cut, vertical);
            self.tree.set_kind(waste, NodeKind::Waste);
            return Step::Descend(node);
        }

        let mut cut = next_cut(at + extent);
        if cut - start < spacing {
            cut = next_cut(start + spacing);
        }
        // Too thin a strip would remain; hand the whole residual down instead.
        if end < cut + min_waste {
            return Step::Descend(self.tree.open_remainder(node));
        }
        let child = self.cut(node, cut, vertical);
        self.commit_if_exact(item, node, child)
    }

    /// 3-cuts: vertical cuts inside a row, isolating the item's width.
    fn third_cut(&mut self, item: &Item, node: NodeIdx, r: &Residual, x: u32) -> Step {
        let min_waste = self.constraints.min_waste;

        if x != r.x() {
            let cut = r.next_cut_x(if x - r.x() < min_waste {
                r.x() + min_waste
            } else {
                x
            });
            return self.cut_waste_column(item, node, r, cut);
        }

        let cut = r.next_cut_x(x + item.width);
        if cut >= r.right() {
            return Step::Descend(self.tree.open_remainder(node));
        }
        if cut != x + item.width {
            // A defect crosses the item's right edge above or below it.
            return self.cut_waste_column(item, node, r, r.next_cut_x(x + min_waste));
        }
        if r.right() < cut + min_waste {
            self.tree.close_remainder(node, NodeKind::Waste);
            return self.retreat(node);
        }
        let child = self.tree.cut_vertical(node, cut);
        self.commit_if_exact(item, node, child)
    }

    fn cut_waste_column(&mut self, item: &Item, node: NodeIdx, r: &Residual, cut: u32) -> Step {
        let min_waste = self.constraints.min_waste;
        if !leaves_usable_strip(r.right(), cut, item.width, min_waste) {
            self.tree.close_remainder(node, NodeKind::Waste);
            return self.retreat(node);
        }
        let waste = self.tree.cut_vertical(node, cut);
        self.tree.set_kind(waste, NodeKind::Waste);
        Step::Descend(node)
    }

    /// 4-cut: one horizontal cut separating the item from a waste piece.
    fn trim(&mut self, item: &Item, node: NodeIdx, r: &Residual) -> Step {
        if r.width() == item.width
            && r.height() == item.length
            && self.tree.node(node).children().is_empty()
        {
            self.tree.finalize(node, NodeKind::Item(item.id));
            return self.placed_above(node);
        }

        let side = trim_side(r, item);
        if side.is_none() || r.height() - item.length < self.constraints.min_waste {
            self.tree.close_remainder(node, NodeKind::Waste);
            tracing::trace!(item = item.id, node = self.tree.node(node).id, "trim failed");
            return self.climb(node);
        }
        if side == Some(TrimSide::Low) {
            let piece = self.tree.cut_horizontal(node, r.y() + item.length);
            self.tree.set_kind(piece, NodeKind::Item(item.id));
            self.tree.close_remainder(node, NodeKind::Waste);
        } else {
            let waste = self.tree.cut_horizontal(node, r.top() - item.length);
            self.tree.set_kind(waste, NodeKind::Waste);
            self.tree.close_remainder(node, NodeKind::Item(item.id));
        }
        self.placed_above(node)
    }
}

/// Which end of a full-width residual can hold the item without touching a
/// defect. The low end wins when both are clear.
fn trim_side(r: &Residual, item: &Item) -> Option<TrimSide> {
    if r.width() != item.width || item.length > r.height() {
        return None;
    }
    if !r.has_defect_in(r.x(), r.right(), r.y(), r.y() + item.length) {
        return Some(TrimSide::Low);
    }
    if !r.has_defect_in(r.x(), r.right(), r.top() - item.length, r.top()) {
        return Some(TrimSide::High);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plates::Plate;
    use crate::types::{Defect, Rect};

    fn tree_with_plate(defects: Vec<Defect>) -> (CutTree, NodeIdx) {
        let mut tree = CutTree::new(0);
        let root = tree.add_root(&Plate::new(0, 6000, 3210, defects));
        (tree, root)
    }

    fn item_rect(tree: &CutTree, id: u32) -> Option<Rect> {
        tree.nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Item(id))
            .map(|n| n.rect)
    }

    fn children_cover_parent(tree: &CutTree) {
        for node in tree.nodes() {
            if node.children().is_empty() {
                continue;
            }
            let area: u64 = node
                .children()
                .iter()
                .map(|&c| tree.node(c).rect.area())
                .sum();
            assert_eq!(area, node.rect.area(), "children of node {} do not cover it", node.id);
            for (i, &a) in node.children().iter().enumerate() {
                for &b in &node.children()[i + 1..] {
                    assert!(!tree.node(a).rect.overlaps(&tree.node(b).rect));
                }
            }
        }
    }

    #[test]
    fn test_single_item_on_clean_plate() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let item = Item::new(1, 1000, 2000);
        let outcome = place(&mut tree, &Constraints::default(), &item, root);
        let column = tree.node(root).children()[0];
        assert_eq!(outcome, PlaceOutcome::Placed(column));
        assert_eq!(tree.node(column).rect, Rect::new(0, 0, 1000, 3210));
        assert_eq!(item_rect(&tree, 1), Some(Rect::new(0, 0, 1000, 2000)));

        finish_plate(&mut tree, column);
        let kinds: Vec<NodeKind> = tree.preorder(root).iter().map(|&i| tree.node(i).kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Branch,
                NodeKind::Branch,
                NodeKind::Item(1),
                NodeKind::Waste,
                NodeKind::Leftover,
            ]
        );
        children_cover_parent(&tree);
    }

    #[test]
    fn test_corner_defect_pushes_item_up() {
        let defect = Defect::new(0, 0, 0, 100, 100);
        let (mut tree, root) = tree_with_plate(vec![defect]);
        let item = Item::new(1, 1000, 2000);
        assert_eq!(
            tree.residual(root).find_place(item.width, item.length, true),
            Some((0, 100))
        );
        let outcome = place(&mut tree, &Constraints::default(), &item, root);
        assert!(matches!(outcome, PlaceOutcome::Placed(_)));
        let rect = item_rect(&tree, 1).unwrap();
        assert_eq!(rect, Rect::new(0, 100, 1000, 2000));
        assert!(!rect.overlaps(&defect.rect()));
        // The strip under the item holding the defect is waste.
        let waste = tree
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Waste)
            .unwrap();
        assert_eq!(waste.rect, Rect::new(0, 0, 1000, 100));
    }

    #[test]
    fn test_item_too_large_fails_and_wastes_plate() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let item = Item::new(1, 7000, 100);
        let outcome = place(&mut tree, &Constraints::default(), &item, root);
        assert_eq!(outcome, PlaceOutcome::Failed(root));
        assert!(tree.residual(root).is_empty());
        let child = tree.node(root).children()[0];
        assert_eq!(tree.node(child).kind, NodeKind::Waste);
        assert_eq!(tree.node(child).rect.area(), 6000 * 3210);
    }

    #[test]
    fn test_exhausted_column_backtracks_to_plate() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let c = Constraints::default();
        let first = place(&mut tree, &c, &Item::new(1, 1000, 2000), root);
        let PlaceOutcome::Placed(column) = first else {
            panic!("first item not placed");
        };
        let second = place(&mut tree, &c, &Item::new(2, 1000, 2000), column);
        assert!(matches!(second, PlaceOutcome::Placed(n) if n != column));
        assert_eq!(item_rect(&tree, 2), Some(Rect::new(1000, 0, 1000, 2000)));
        // The rest of the first column was given up as waste.
        let column_children: Vec<NodeKind> = tree
            .node(column)
            .children()
            .iter()
            .map(|&c| tree.node(c).kind)
            .collect();
        assert_eq!(column_children, vec![NodeKind::Item(1), NodeKind::Waste]);
    }

    #[test]
    fn test_narrow_item_gets_minimum_column_and_third_cut() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let outcome = place(&mut tree, &Constraints::default(), &Item::new(1, 50, 400), root);
        assert!(matches!(outcome, PlaceOutcome::Placed(_)));
        let column = tree.node(root).children()[0];
        assert_eq!(tree.node(column).rect.width, 100);
        let rect = item_rect(&tree, 1).unwrap();
        assert_eq!(rect, Rect::new(0, 0, 50, 400));
        assert_eq!(tree.nodes().iter().find(|n| n.rect == rect).unwrap().depth, 3);
    }

    #[test]
    fn test_short_item_is_trimmed_low() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let outcome = place(&mut tree, &Constraints::default(), &Item::new(1, 300, 50), root);
        assert!(matches!(outcome, PlaceOutcome::Placed(_)));
        let item = tree
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Item(1))
            .unwrap();
        assert_eq!(item.rect, Rect::new(0, 0, 300, 50));
        assert_eq!(item.depth, 4);
        let trim_waste = tree
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Waste && n.depth == 4)
            .unwrap();
        assert_eq!(trim_waste.rect, Rect::new(0, 50, 300, 50));
    }

    #[test]
    fn test_trim_uses_high_end_when_low_end_touches_defect() {
        // The defect sits right on the line where a low trim would cut.
        let defect = Defect::new(0, 100, 50, 10, 10);
        let (mut tree, root) = tree_with_plate(vec![defect]);
        let c = Constraints::default().with_min_2_cut(150);
        let outcome = place(&mut tree, &c, &Item::new(1, 300, 50), root);
        assert!(matches!(outcome, PlaceOutcome::Placed(_)));
        let rect = item_rect(&tree, 1).unwrap();
        assert_eq!(rect, Rect::new(0, 100, 300, 50));
        assert!(!rect.overlaps(&defect.rect()));
    }

    #[test]
    fn test_trim_side_prefers_low() {
        let r = Residual::new(Rect::new(0, 0, 300, 200), &[]);
        assert_eq!(trim_side(&r, &Item::new(1, 300, 50)), Some(TrimSide::Low));
        assert_eq!(trim_side(&r, &Item::new(1, 200, 50)), None);
        assert_eq!(trim_side(&r, &Item::new(1, 300, 250)), None);
        let blocked = Residual::new(
            Rect::new(0, 0, 300, 200),
            &[Defect::new(0, 10, 10, 5, 5), Defect::new(1, 10, 190, 5, 5)],
        );
        assert_eq!(trim_side(&blocked, &Item::new(1, 300, 50)), None);
    }

    #[test]
    fn test_third_cut_waste_guard_compares_item_width() {
        // A 10 wide strip left for a 10 wide item is fine even though it is
        // below the minimum waste size. Comparing the strip with the item's
        // length instead would reject it.
        assert!(leaves_usable_strip(100, 90, 10, 20));
        assert!(!leaves_usable_strip(100, 90, 400, 20));
        assert!(leaves_usable_strip(100, 70, 400, 20));
        assert!(!leaves_usable_strip(100, 110, 10, 20));
    }

    #[test]
    fn test_finish_plate_without_residual_adds_nothing() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let item = Item::new(1, 6000, 3210);
        let outcome = place(&mut tree, &Constraints::default(), &item, root);
        assert!(matches!(outcome, PlaceOutcome::Placed(_)));
        let before = tree.len();
        if let PlaceOutcome::Placed(next) = outcome {
            finish_plate(&mut tree, next);
        }
        assert_eq!(tree.len(), before);
        assert!(tree.nodes().iter().all(|n| n.kind != NodeKind::Leftover));
        children_cover_parent(&tree);
    }

    #[test]
    fn test_failed_attempts_keep_their_waste() {
        let (mut tree, root) = tree_with_plate(vec![]);
        let c = Constraints::default();
        let PlaceOutcome::Placed(column) = place(&mut tree, &c, &Item::new(1, 1000, 2000), root)
        else {
            panic!("first item not placed");
        };
        let outcome = place(&mut tree, &c, &Item::new(2, 5500, 3000), column);
        assert_eq!(outcome, PlaceOutcome::Failed(root));
        assert!(tree.nodes().iter().filter(|n| n.kind == NodeKind::Waste).count() >= 2);
        children_cover_parent(&tree);
    }
}
