use crate::tree::{CutTree, NodeIdx, NodeKind};

pub fn waste_area(tree: &CutTree, root: NodeIdx) -> u64 {
    area_of_kind(tree, root, |kind| kind == NodeKind::Waste)
}

pub fn total_waste_area(tree: &CutTree) -> u64 {
    tree.roots().iter().map(|&root| waste_area(tree, root)).sum()
}

/// Area still open for cutting along the ancestor chain of `node`.
/// With `skip_root` the plate's own residual is left out.
pub fn open_residual_area(tree: &CutTree, node: NodeIdx, skip_root: bool) -> u64 {
    tree.ancestry(node)
        .filter(|&idx| !(skip_root && tree.node(idx).is_root()))
        .map(|idx| tree.residual(idx).area())
        .sum()
}

pub(crate) fn area_of_kind(tree: &CutTree, root: NodeIdx, wanted: impl Fn(NodeKind) -> bool) -> u64 {
    let mut total = 0;
    let mut pending = vec![root];
    while let Some(idx) = pending.pop() {
        let node = tree.node(idx);
        if wanted(node.kind) {
            total += node.rect.area();
        }
        pending.extend_from_slice(node.children());
    }
    total
}
