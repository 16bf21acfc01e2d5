use std::collections::HashSet;

use super::hierarchy::MAX_WALK_DEPTH;
use super::types::{LinkEnd, LinkKind, NodeIdx, NodeKind, PathToMain, TreeLayout};

/// Cards and connectors between `idx` and the focal card, for hover highlighting.
pub(super) fn path_to_main(layout: &TreeLayout, idx: NodeIdx) -> PathToMain {
    let walker = PathWalker {
        layout,
        main: layout.main(),
    };
    let datum = layout.node(idx);
    let spouse_of_main = datum
        .kind
        .spouse_of()
        .is_some_and(|owner| layout.node(owner).person == layout.main_id);

    let mut path = if datum.is_ancestry {
        walker.ancestry(idx)
    } else if spouse_of_main {
        PathToMain {
            nodes: vec![walker.main, idx],
            links: walker.links_where(|l| l.target == LinkEnd::Single(idx)),
            truncated: false,
        }
    } else if let NodeKind::Sibling { parents } = &datum.kind {
        let main = walker.main;
        let mut nodes = vec![main, idx];
        nodes.extend(parents.iter().copied());
        PathToMain {
            nodes,
            links: walker.links_where(|l| {
                l.source == LinkEnd::Single(idx)
                    || (l.source == LinkEnd::Single(main) && matches!(l.target, LinkEnd::Couple(_)))
                    || (l.kind == LinkKind::Spouse
                        && parents.contains(&l.source.first())
                        && parents.contains(&l.target.first()))
            }),
            truncated: false,
        }
    } else {
        walker.progeny(idx)
    };
    dedup(&mut path.nodes);
    dedup(&mut path.links);
    path
}

fn dedup<T: Copy + Eq + std::hash::Hash>(items: &mut Vec<T>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(*item));
}

struct PathWalker<'a> {
    layout: &'a TreeLayout,
    main: NodeIdx,
}

impl PathWalker<'_> {
    fn links_where(&self, pred: impl Fn(&super::types::Link) -> bool) -> Vec<usize> {
        self.layout
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| pred(l))
            .map(|(i, _)| i)
            .collect()
    }

    fn find(&self, pred: impl Fn(&super::types::Link) -> bool) -> Option<usize> {
        self.layout.links.iter().position(pred)
    }

    fn ancestry(&self, idx: NodeIdx) -> PathToMain {
        let links = &self.layout.links;
        let mut path = Vec::new();
        let mut truncated = false;
        let mut parent = idx;
        let mut steps = 0;
        while parent != self.main {
            if steps == MAX_WALK_DEPTH {
                truncated = true;
                break;
            }
            steps += 1;
            let spouse_link = self.find(|l| {
                l.kind == LinkKind::Spouse
                    && (l.source.contains(parent) || l.target.contains(parent))
            });
            let candidates = match spouse_link {
                Some(s) => {
                    let (a, b) = (links[s].source.first(), links[s].target.first());
                    self.links_where(|l| {
                        l.kind == LinkKind::Ancestry && l.target.contains(a) && l.target.contains(b)
                    })
                }
                None => self
                    .links_where(|l| l.kind == LinkKind::Ancestry && l.target.contains(parent)),
            };
            let child_link = match candidates[..] {
                [] => None,
                [only] => Some(only),
                _ => candidates
                    .iter()
                    .copied()
                    .find(|&c| links[c].source.contains(self.main)),
            };
            let Some(child_link) = child_link else {
                break;
            };
            path.extend(spouse_link);
            path.push(child_link);
            parent = links[child_link].source.first();
        }
        if truncated {
            tracing::warn!(limit = MAX_WALK_DEPTH, "ancestry path to main truncated");
        }
        PathToMain {
            nodes: self.cards(idx, &path, idx),
            links: path,
            truncated,
        }
    }

    fn progeny(&self, idx: NodeIdx) -> PathToMain {
        let links = &self.layout.links;
        let mut path = Vec::new();
        let mut truncated = false;
        let mut child = idx;
        let mut steps = 0;
        while child != self.main {
            if steps == MAX_WALK_DEPTH {
                truncated = true;
                break;
            }
            steps += 1;
            let child_link =
                self.find(|l| l.kind == LinkKind::Progeny && l.target == LinkEnd::Single(child));
            if let Some(child_link) = child_link {
                let parents = links[child_link].source.nodes();
                let spouse_link = self.find(|l| {
                    l.kind == LinkKind::Spouse
                        && parents.contains(&l.source.first())
                        && parents.contains(&l.target.first())
                });
                path.push(child_link);
                path.extend(spouse_link);
                child = match spouse_link {
                    Some(s) => links[s].source.first(),
                    None => links[child_link].source.first(),
                };
            } else {
                let spouse_link = self
                    .find(|l| l.kind == LinkKind::Spouse && l.target == LinkEnd::Single(child));
                let Some(spouse_link) = spouse_link else {
                    break;
                };
                path.push(spouse_link);
                child = links[spouse_link].source.first();
            }
        }
        if truncated {
            tracing::warn!(limit = MAX_WALK_DEPTH, "progeny path to main truncated");
        }
        PathToMain {
            nodes: self.cards(idx, &path, self.main),
            links: path,
            truncated,
        }
    }

    /// The focal card, the hovered card, and the chain of cards descending from `top` along
    /// the collected connectors.
    fn cards(&self, datum: NodeIdx, path: &[usize], top: NodeIdx) -> Vec<NodeIdx> {
        let links = &self.layout.links;
        let mut cards = vec![self.main, datum];
        let mut visited = HashSet::from([top]);
        let mut stack = vec![top];
        while let Some(card) = stack.pop() {
            for &l in path {
                let link = &links[l];
                let below = match link.kind {
                    LinkKind::Ancestry if link.target.contains(card) => link.source.first(),
                    LinkKind::Progeny if link.source.contains(card) => link.target.first(),
                    _ => continue,
                };
                if visited.insert(below) {
                    cards.push(below);
                    stack.push(below);
                }
            }
        }
        cards
    }
}
