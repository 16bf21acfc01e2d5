//! Reingold-Tilford tidy tree placement with Buchheim's linear-time apportion.
//!
//! Produces the same coordinates as d3-hierarchy's `tree().nodeSize([dx, dy])`: the root
//! lands on x = 0, sibling gaps come from the separation callback in node-width units, and
//! y is `depth * dy`.

use super::hierarchy::Hierarchy;

struct Walk {
    parent: Vec<usize>,
    children: Vec<Vec<usize>>,
    /// Index among siblings.
    number: Vec<usize>,
    prelim: Vec<f64>,
    modifier: Vec<f64>,
    change: Vec<f64>,
    shift: Vec<f64>,
    thread: Vec<Option<usize>>,
    ancestor: Vec<usize>,
    default_ancestor: Vec<Option<usize>>,
}

impl Walk {
    fn next_left(&self, v: usize) -> Option<usize> {
        self.children[v].first().copied().or(self.thread[v])
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.children[v].last().copied().or(self.thread[v])
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f64) {
        let change = shift / (self.number[wp] as f64 - self.number[wm] as f64);
        self.change[wp] -= change;
        self.shift[wp] += shift;
        self.change[wm] += change;
        self.prelim[wp] += shift;
        self.modifier[wp] += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        for &w in self.children[v].clone().iter().rev() {
            self.prelim[w] += shift;
            self.modifier[w] += shift;
            change += self.change[w];
            shift += self.shift[w] + change;
        }
    }

    fn next_ancestor(&self, vim: usize, v: usize, ancestor: usize) -> usize {
        let candidate = self.ancestor[vim];
        if self.parent[candidate] == self.parent[v] {
            candidate
        } else {
            ancestor
        }
    }
}

/// Places every node reachable from the hierarchy root. `separation(right, left)` returns
/// the gap between two neighbours in units of `dx`.
pub(super) fn place(
    hierarchy: &mut Hierarchy,
    dx: f64,
    dy: f64,
    separation: impl Fn(usize, usize) -> f64,
) {
    let order = hierarchy.descendants();
    let n = hierarchy.nodes.len();
    // Slot `n` is the virtual parent of the root.
    let virtual_root = n;
    let mut walk = Walk {
        parent: vec![virtual_root; n + 1],
        children: vec![Vec::new(); n + 1],
        number: vec![0; n + 1],
        prelim: vec![0.0; n + 1],
        modifier: vec![0.0; n + 1],
        change: vec![0.0; n + 1],
        shift: vec![0.0; n + 1],
        thread: vec![None; n + 1],
        ancestor: (0..=n).collect(),
        default_ancestor: vec![None; n + 1],
    };
    for &v in &order {
        let children = hierarchy.nodes[v].children.clone();
        for (i, &child) in children.iter().enumerate() {
            walk.parent[child] = v;
            walk.number[child] = i;
        }
        walk.children[v] = children;
    }
    walk.children[virtual_root] = vec![Hierarchy::ROOT];

    for v in post_order(&walk.children) {
        first_walk(&mut walk, v, &separation);
    }
    walk.modifier[virtual_root] = -walk.prelim[Hierarchy::ROOT];
    for &v in &order {
        let parent_mod = walk.modifier[walk.parent[v]];
        hierarchy.nodes[v].x = (walk.prelim[v] + parent_mod) * dx;
        hierarchy.nodes[v].y = hierarchy.nodes[v].depth as f64 * dy;
        walk.modifier[v] += parent_mod;
    }
}

/// Children before parents, left subtrees before right ones.
fn post_order(children: &[Vec<usize>]) -> Vec<usize> {
    let mut stack = vec![Hierarchy::ROOT];
    let mut out = Vec::new();
    while let Some(v) = stack.pop() {
        out.push(v);
        stack.extend(children[v].iter().copied());
    }
    out.reverse();
    out
}

fn first_walk(walk: &mut Walk, v: usize, separation: &impl Fn(usize, usize) -> f64) {
    let parent = walk.parent[v];
    let left = (walk.number[v] > 0).then(|| walk.children[parent][walk.number[v] - 1]);
    if let (Some(&first), Some(&last)) = (walk.children[v].first(), walk.children[v].last()) {
        walk.execute_shifts(v);
        let midpoint = (walk.prelim[first] + walk.prelim[last]) / 2.0;
        match left {
            Some(w) => {
                walk.prelim[v] = walk.prelim[w] + separation(v, w);
                walk.modifier[v] = walk.prelim[v] - midpoint;
            }
            None => walk.prelim[v] = midpoint,
        }
    } else if let Some(w) = left {
        walk.prelim[v] = walk.prelim[w] + separation(v, w);
    }
    let fallback = walk.default_ancestor[parent].unwrap_or(walk.children[parent][0]);
    walk.default_ancestor[parent] = Some(apportion(walk, v, left, fallback, separation));
}

fn apportion(
    walk: &mut Walk,
    v: usize,
    left: Option<usize>,
    mut ancestor: usize,
    separation: &impl Fn(usize, usize) -> f64,
) -> usize {
    let Some(w) = left else {
        return ancestor;
    };
    let mut vip = v;
    let mut vop = v;
    let mut vim = w;
    let mut vom = walk.children[walk.parent[vip]][0];
    let mut sip = walk.modifier[vip];
    let mut sop = walk.modifier[vop];
    let mut sim = walk.modifier[vim];
    let mut som = walk.modifier[vom];

    let mut next_im = walk.next_right(vim);
    let mut next_ip = walk.next_left(vip);
    while let (Some(im), Some(ip)) = (next_im, next_ip) {
        vim = im;
        vip = ip;
        // Contours of a well-formed tree never run out on the outer side first.
        let (Some(om), Some(op)) = (walk.next_left(vom), walk.next_right(vop)) else {
            break;
        };
        vom = om;
        vop = op;
        walk.ancestor[vop] = v;
        let shift = walk.prelim[vim] + sim - walk.prelim[vip] - sip + separation(vim, vip);
        if shift > 0.0 {
            let wm = walk.next_ancestor(vim, v, ancestor);
            walk.move_subtree(wm, v, shift);
            sip += shift;
            sop += shift;
        }
        sim += walk.modifier[vim];
        sip += walk.modifier[vip];
        som += walk.modifier[vom];
        sop += walk.modifier[vop];
        next_im = walk.next_right(vim);
        next_ip = walk.next_left(vip);
    }
    if let Some(im) = next_im
        && walk.next_right(vop).is_none()
    {
        walk.thread[vop] = Some(im);
        walk.modifier[vop] += sim - sop;
    }
    if let Some(ip) = next_ip
        && walk.next_left(vom).is_none()
    {
        walk.thread[vom] = Some(ip);
        walk.modifier[vom] += sip - som;
        ancestor = v;
    }
    ancestor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::hierarchy::HNode;
    use crate::person::PersonId;

    fn tree(shape: &[(usize, &[usize])]) -> Hierarchy {
        let count = shape.iter().map(|(_, c)| c.len()).sum::<usize>() + 1;
        let mut nodes: Vec<HNode> = (0..count)
            .map(|i| HNode::new(PersonId::new(format!("n{i}")), None, 0))
            .collect();
        for (parent, children) in shape {
            nodes[*parent].children = children.to_vec();
            for &child in children.iter() {
                nodes[child].parent = Some(*parent);
                nodes[child].depth = nodes[*parent].depth + 1;
            }
        }
        Hierarchy { nodes }
    }

    #[test]
    fn root_is_centered_over_children() {
        let mut h = tree(&[(0, &[1, 2, 3])]);
        place(&mut h, 10.0, 5.0, |_, _| 1.0);
        let xs: Vec<f64> = h.nodes.iter().map(|n| n.x).collect();
        assert_eq!(xs, vec![0.0, -10.0, 0.0, 10.0]);
        assert_eq!(h.nodes[2].y, 5.0);
    }

    #[test]
    fn subtrees_are_pushed_apart_by_contour() {
        // 0 -> 1, 2; 1 -> 3, 4; 2 -> 5, 6
        let mut h = tree(&[(0, &[1, 2]), (1, &[3, 4]), (2, &[5, 6])]);
        place(&mut h, 1.0, 1.0, |_, _| 1.0);
        let x = |i: usize| h.nodes[i].x;
        assert_eq!(x(0), 0.0);
        assert!(x(5) - x(4) >= 1.0 - 1e-9);
        assert_eq!(x(4) - x(3), 1.0);
        assert!((x(1) + x(2)).abs() < 1e-9);
    }

    #[test]
    fn middle_subtrees_are_spread_evenly() {
        // wide first and last subtrees, leaf in the middle
        let mut h = tree(&[(0, &[1, 2, 3]), (1, &[4, 5, 6]), (3, &[7, 8, 9])]);
        place(&mut h, 1.0, 1.0, |_, _| 1.0);
        let x = |i: usize| h.nodes[i].x;
        assert!((x(2) - x(1) - (x(3) - x(2))).abs() < 1e-9);
        assert!(x(7) - x(6) >= 1.0 - 1e-9);
    }
}
