use super::hierarchy::Hierarchy;
use super::types::{NodeIdx, NodeKind, TreeNode};

/// Flat tree plus the hierarchy-to-tree index maps of both sides.
pub(super) struct Merged {
    pub nodes: Vec<TreeNode>,
    pub progeny_slots: Vec<Option<NodeIdx>>,
    pub ancestry_slots: Vec<Option<NodeIdx>>,
}

/// Joins both placed hierarchies at the shared root: progeny nodes first, then every ancestry
/// node except its root. Ancestry nodes one level up point at the progeny root.
pub(super) fn merge(progeny: &Hierarchy, ancestry: &Hierarchy) -> Merged {
    let progeny_order = progeny.descendants();
    let ancestry_order = ancestry.descendants();
    let mid = (ancestry.nodes[Hierarchy::ROOT].x - progeny.nodes[Hierarchy::ROOT].x) / 2.0;

    let mut nodes = Vec::with_capacity(progeny_order.len() + ancestry_order.len());
    let mut progeny_slots = vec![None; progeny.nodes.len()];
    let mut ancestry_slots = vec![None; ancestry.nodes.len()];

    for &h in &progeny_order {
        let source = &progeny.nodes[h];
        let mut node = TreeNode::new(source.person.clone(), NodeKind::Blood);
        node.x = source.x + mid;
        node.y = source.y;
        node.depth = source.depth;
        node.parent = source.parent.and_then(|p| progeny_slots[p]);
        progeny_slots[h] = Some(NodeIdx(nodes.len()));
        nodes.push(node);
    }

    ancestry_slots[Hierarchy::ROOT] = Some(NodeIdx(0));
    for &h in ancestry_order.iter().skip(1) {
        let source = &ancestry.nodes[h];
        let mut node = TreeNode::new(source.person.clone(), NodeKind::Blood);
        node.x = source.x - mid;
        node.y = source.y;
        node.depth = source.depth;
        node.is_ancestry = true;
        node.parent = if source.depth == 1 {
            Some(NodeIdx(0))
        } else {
            source.parent.and_then(|p| ancestry_slots[p])
        };
        ancestry_slots[h] = Some(NodeIdx(nodes.len()));
        nodes.push(node);
    }

    for &h in ancestry_order.iter().skip(1) {
        let Some(slot) = ancestry_slots[h] else {
            continue;
        };
        nodes[slot.0].pair_partner = ancestry.nodes[h]
            .pair_partner
            .and_then(|p| ancestry_slots[p]);
    }

    link_family(&mut nodes);
    Merged {
        nodes,
        progeny_slots,
        ancestry_slots,
    }
}

/// Fills `children` on the progeny side and `parents` on the ancestry side from parent pointers.
fn link_family(nodes: &mut [TreeNode]) {
    for idx in 0..nodes.len() {
        let Some(parent) = nodes[idx].parent else {
            continue;
        };
        if nodes[idx].is_ancestry {
            nodes[parent.0].parents.push(NodeIdx(idx));
        } else {
            nodes[parent.0].children.push(NodeIdx(idx));
        }
    }
}

/// Flips the ancestry side above the root and swaps axes for horizontal trees. Spouse and
/// parent anchors are already expressed in the final frame.
pub(super) fn orient(nodes: &mut [TreeNode], is_horizontal: bool) {
    for node in nodes.iter_mut() {
        if node.is_ancestry {
            node.y = -node.y;
        }
        if is_horizontal {
            std::mem::swap(&mut node.x, &mut node.y);
        }
    }
}
