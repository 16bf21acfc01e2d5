use crate::store::RelationStore;
use std::collections::HashSet;

use super::types::{Link, LinkEnd, LinkKind, NodeIdx, NodeKind, Point, TreeNode};

/// Distance cards travel off-screen when they leave.
const EXIT_DISTANCE: f64 = 400.0;

/// Builds every connector in tree order. A connector reached from both of its ends is kept once.
pub(super) fn build(nodes: &[TreeNode], store: &RelationStore, is_horizontal: bool) -> Vec<Link> {
    let builder = LinkBuilder {
        nodes,
        store,
        is_horizontal,
    };
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for idx in (0..nodes.len()).map(NodeIdx) {
        for link in builder.links_of(idx) {
            if seen.insert(link.id.clone()) {
                links.push(link);
            }
        }
    }
    links
}

struct LinkBuilder<'a> {
    nodes: &'a [TreeNode],
    store: &'a RelationStore,
    is_horizontal: bool,
}

impl LinkBuilder<'_> {
    fn node(&self, idx: NodeIdx) -> &TreeNode {
        &self.nodes[idx.0]
    }

    fn links_of(&self, idx: NodeIdx) -> Vec<Link> {
        let d = self.node(idx);
        let mut out = Vec::new();
        if !d.spouses.is_empty() {
            out.extend(d.spouses.iter().map(|&s| self.spouse_link(idx, s)));
        } else if let Some(partner) = d.pair_partner {
            out.push(self.spouse_link(idx, partner));
        }
        if let Some(link) = self.ancestry_link(idx) {
            out.push(link);
        }
        for &child in &d.children {
            out.push(self.progeny_link(idx, child));
        }
        out
    }

    fn spouse_link(&self, idx: NodeIdx, spouse: NodeIdx) -> Link {
        let (d, s) = (self.node(idx), self.node(spouse));
        let collapsed = if d.is_ancestry {
            let (ex, ey) = enter_position(self.nodes, idx);
            vec![(ex - 0.0001, ey), enter_position(self.nodes, spouse)]
        } else {
            vec![d.position(), (d.x - 0.0001, d.y)]
        };
        Link {
            id: self.link_id(&[idx, spouse]),
            kind: LinkKind::Spouse,
            points: vec![d.position(), s.position()],
            collapsed,
            curve: false,
            depth: d.depth,
            is_ancestry: s.is_ancestry,
            source: LinkEnd::Single(idx),
            target: LinkEnd::Single(spouse),
        }
    }

    fn ancestry_link(&self, idx: NodeIdx) -> Option<Link> {
        let d = self.node(idx);
        let (&p1, rest) = d.linked_parents().split_first()?;
        let p2 = rest.first().copied().unwrap_or(p1);
        let (a, b) = (self.node(p1), self.node(p2));
        let mid = (a.x - (a.x - b.x) / 2.0, a.y - (a.y - b.y) / 2.0);
        Some(Link {
            id: self.link_id(&[idx, p1, p2]),
            kind: LinkKind::Ancestry,
            points: self.elbow(d.position(), mid),
            collapsed: self.elbow(d.position(), d.position()),
            curve: true,
            depth: d.depth + 1,
            is_ancestry: true,
            source: LinkEnd::Single(idx),
            target: LinkEnd::pair(p1, p2),
        })
    }

    fn progeny_link(&self, idx: NodeIdx, child: NodeIdx) -> Link {
        let d = self.node(idx);
        let other = self.other_parent(idx, child).unwrap_or(idx);
        let o = self.node(other);
        let sx = o.sx.unwrap_or(o.x);
        let anchor = if self.is_horizontal {
            (d.x, sx)
        } else {
            (sx, d.y)
        };
        Link {
            id: self.link_id(&[child, idx, other]),
            kind: LinkKind::Progeny,
            points: self.elbow(self.node(child).position(), anchor),
            collapsed: self.elbow(anchor, anchor),
            curve: true,
            depth: d.depth + 1,
            is_ancestry: false,
            source: LinkEnd::pair(idx, other),
            target: LinkEnd::Single(child),
        }
    }

    /// The spouse card of `parent` that is the child's other parent.
    fn other_parent(&self, parent: NodeIdx, child: NodeIdx) -> Option<NodeIdx> {
        let rels = &self.store.get(&self.node(child).person)?.rels;
        self.node(parent)
            .spouses
            .iter()
            .copied()
            .find(|&s| rels.is_parent(&self.node(s).person))
    }

    /// Six-point orthogonal connector that bends halfway along the generation axis.
    fn elbow(&self, (dx, dy): Point, (px, py): Point) -> Vec<Point> {
        if self.is_horizontal {
            let hx = dx + (px - dx) / 2.0;
            vec![(dx, dy), (hx, dy), (hx, dy), (hx, py), (hx, py), (px, py)]
        } else {
            let hy = dy + (py - dy) / 2.0;
            vec![(dx, dy), (dx, hy), (dx, hy), (px, hy), (px, hy), (px, py)]
        }
    }

    fn link_id(&self, ends: &[NodeIdx]) -> String {
        let mut tids: Vec<&str> = ends.iter().map(|e| self.node(*e).tid.as_str()).collect();
        tids.sort_unstable();
        tids.dedup();
        tids.join(", ")
    }
}

/// Where a card starts its entrance transition: the card it grows out of.
pub(super) fn enter_position(nodes: &[TreeNode], idx: NodeIdx) -> Point {
    let d = &nodes[idx.0];
    match &d.kind {
        NodeKind::Spouse { of } | NodeKind::Placeholder { of } => nodes[of.0].position(),
        NodeKind::Sibling { .. } => nodes[0].position(),
        NodeKind::Blood if d.depth == 0 => d.position(),
        NodeKind::Blood if d.is_ancestry => match d.parent {
            Some(parent) => nodes[parent.0].position(),
            None => d.position(),
        },
        NodeKind::Blood => match (d.psx, d.psy) {
            (Some(x), Some(y)) => (x, y),
            _ => d.position(),
        },
    }
}

/// Where a card goes when it leaves: pushed outward from the origin on both axes.
pub(super) fn exit_position(node: &TreeNode) -> Point {
    let away = |v: f64| v + EXIT_DISTANCE * if v > 0.0 { 1.0 } else { -1.0 };
    (away(node.x), away(node.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, x: f64, y: f64) -> TreeNode {
        let mut node = TreeNode::new(id.into(), NodeKind::Blood);
        node.tid = id.to_string();
        node.x = x;
        node.y = y;
        node
    }

    #[test]
    fn single_parent_ancestry_link_targets_one_card() {
        let mut main = node("M", 0.0, 0.0);
        main.parents = vec![NodeIdx(1)];
        let mut father = node("F", 0.0, -150.0);
        father.is_ancestry = true;
        father.depth = 1;
        father.parent = Some(NodeIdx(0));
        let nodes = vec![main, father];
        let links = build(&nodes, &RelationStore::new(), false);
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.id, "F, M");
        assert_eq!(link.kind, LinkKind::Ancestry);
        assert_eq!(link.target, LinkEnd::Single(NodeIdx(1)));
        assert_eq!(link.points[1], (0.0, -75.0));
        assert_eq!(link.points.len(), 6);
        assert!(link.collapsed.iter().all(|p| *p == (0.0, 0.0)));
    }

    #[test]
    fn ancestry_couple_gets_one_spouse_link() {
        let mut main = node("M", 0.0, 0.0);
        main.parents = vec![NodeIdx(1), NodeIdx(2)];
        let mut father = node("F", -125.0, -150.0);
        let mut mother = node("Mo", 125.0, -150.0);
        for (parent, partner) in [(&mut father, 2), (&mut mother, 1)] {
            parent.is_ancestry = true;
            parent.depth = 1;
            parent.parent = Some(NodeIdx(0));
            parent.pair_partner = Some(NodeIdx(partner));
        }
        let nodes = vec![main, father, mother];
        let links = build(&nodes, &RelationStore::new(), false);
        let spouse: Vec<&Link> = links.iter().filter(|l| l.kind == LinkKind::Spouse).collect();
        assert_eq!(spouse.len(), 1);
        assert_eq!(spouse[0].source, LinkEnd::Single(NodeIdx(1)));
        assert_eq!(spouse[0].collapsed[0], (-0.0001, 0.0));
        let ancestry = links.iter().find(|l| l.kind == LinkKind::Ancestry).expect("link");
        assert_eq!(ancestry.target, LinkEnd::Couple([NodeIdx(1), NodeIdx(2)]));
        assert_eq!(ancestry.points[5], (0.0, -150.0));
    }

    #[test]
    fn exit_pushes_away_from_origin() {
        assert_eq!(exit_position(&node("A", 10.0, -5.0)), (410.0, -405.0));
        assert_eq!(exit_position(&node("B", 0.0, 0.0)), (-400.0, -400.0));
    }

    #[test]
    fn spouse_enters_from_its_partner() {
        let partner = node("H", -125.0, 150.0);
        let mut spouse = node("W", 125.0, 150.0);
        spouse.kind = NodeKind::Spouse { of: NodeIdx(1) };
        let nodes = vec![node("M", 0.0, 0.0), partner, spouse];
        assert_eq!(enter_position(&nodes, NodeIdx(2)), (-125.0, 150.0));
        assert_eq!(enter_position(&nodes, NodeIdx(0)), (0.0, 0.0));
    }
}
