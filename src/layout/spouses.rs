use crate::person::Person;
use crate::store::RelationStore;

use super::types::{NodeIdx, NodeKind, TreeNode};

/// Seats spouses beside every non-ancestry node, walking the tree backwards so higher
/// generations shift last, then pulls each pair of ancestry parents apart around their midpoint.
pub(super) fn place(nodes: &mut Vec<TreeNode>, store: &RelationStore, node_separation: f64) {
    let ns = node_separation;
    for idx in (0..nodes.len()).rev() {
        if nodes[idx].is_ancestry {
            continue;
        }
        let Some(person) = store.get(&nodes[idx].person) else {
            continue;
        };
        let spouses: Vec<&Person> = person
            .rels
            .spouses
            .iter()
            .filter_map(|id| store.get(id))
            .collect();
        if spouses.is_empty() {
            continue;
        }
        let side = if person.is_male() { -1.0 } else { 1.0 };
        nodes[idx].x += spouses.len() as f64 / 2.0 * ns * side;
        let (x, y) = nodes[idx].position();
        let depth = nodes[idx].depth;
        let of = NodeIdx(idx);

        for (i, spouse) in spouses.into_iter().enumerate() {
            let kind = if spouse.to_add {
                NodeKind::Placeholder { of }
            } else {
                NodeKind::Spouse { of }
            };
            let mut node = TreeNode::new(spouse.id.clone(), kind);
            node.x = x - ns * (i + 1) as f64 * side;
            node.y = y;
            node.depth = depth;
            let offset = if i > 0 { 0.0 } else { ns / 2.0 * side };
            node.sx = Some(node.x + offset);
            node.sy = Some(node.y + offset);
            let spouse_idx = NodeIdx(nodes.len());
            nodes.push(node);
            nodes[idx].spouses.push(spouse_idx);
        }
    }

    for idx in 0..nodes.len() {
        let [p1, p2] = nodes[idx].parents[..] else {
            continue;
        };
        let (x1, x2) = (nodes[p1.0].x, nodes[p2.0].x);
        let mid = x1 - (x1 - x2) / 2.0;
        let beside = |a: f64, b: f64| mid + ns / 2.0 * if a < b { 1.0 } else { -1.0 };
        let x2 = beside(x1, x2);
        nodes[p2.0].x = x2;
        nodes[p1.0].x = beside(x2, x1);
    }
}

/// Records on each descendant where its parents' shared connector starts.
pub(super) fn anchor_progeny_parents(
    nodes: &mut [TreeNode],
    store: &RelationStore,
    is_horizontal: bool,
) {
    for idx in 0..nodes.len() {
        let node = &nodes[idx];
        if node.is_ancestry || node.depth == 0 || node.kind != NodeKind::Blood {
            continue;
        }
        let Some(parent) = node.parent else {
            continue;
        };
        let rels = store.get(&node.person).map(|p| &p.rels);
        let is_parent = |candidate: NodeIdx| {
            rels.is_some_and(|rels| rels.is_parent(&nodes[candidate.0].person))
        };
        let partner = nodes[parent.0].spouses.iter().copied().find(|&s| is_parent(s));
        let anchor = match partner {
            Some(partner) => partner,
            None => {
                let p = &mut nodes[parent.0];
                p.sx = Some(p.x);
                p.sy = Some(p.y);
                parent
            }
        };
        let a = &nodes[anchor.0];
        let sx = a.sx.unwrap_or(a.x);
        let (psx, psy) = if is_horizontal { (a.y, sx) } else { (sx, a.y) };
        nodes[idx].psx = Some(psx);
        nodes[idx].psy = Some(psy);
    }
}
