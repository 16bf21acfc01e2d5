use crate::person::{Person, PersonId};
use crate::store::RelationStore;
use std::cmp::{Ordering, Reverse};
use std::collections::VecDeque;

use super::{Diagnostic, Hooks, WalkKind};

pub(super) const MAX_WALK_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Progeny,
    Ancestry,
}

#[derive(Debug, Clone)]
pub(super) struct HNode {
    pub person: PersonId,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    pub x: f64,
    pub y: f64,
    pub pair_partner: Option<usize>,
}

impl HNode {
    pub fn new(person: PersonId, parent: Option<usize>, depth: usize) -> Self {
        Self {
            person,
            parent,
            children: Vec::new(),
            depth,
            x: 0.0,
            y: 0.0,
            pair_partner: None,
        }
    }
}

/// One side of the tree, rooted at the focal person. Pruned nodes stay in the arena but
/// are no longer reachable from the root.
#[derive(Debug, Clone)]
pub(super) struct Hierarchy {
    pub nodes: Vec<HNode>,
}

impl Hierarchy {
    pub const ROOT: usize = 0;

    /// Reachable nodes in breadth-first order.
    pub fn descendants(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([Self::ROOT]);
        while let Some(idx) = queue.pop_front() {
            out.push(idx);
            queue.extend(self.nodes[idx].children.iter().copied());
        }
        out
    }

    fn on_path_to_root(&self, mut idx: usize, person: &PersonId) -> bool {
        loop {
            if self.nodes[idx].person == *person {
                return true;
            }
            match self.nodes[idx].parent {
                Some(parent) => idx = parent,
                None => return false,
            }
        }
    }

    /// Cross-links the two parents of every ancestry node that has both.
    pub fn link_pairs(&mut self) {
        for idx in self.descendants() {
            if let [a, b] = self.nodes[idx].children[..] {
                self.nodes[a].pair_partner = Some(b);
                self.nodes[b].pair_partner = Some(a);
            }
        }
    }

    /// Drops the children of every node at `max_depth`.
    pub fn trim(&mut self, max_depth: Option<usize>) {
        let Some(max_depth) = max_depth else {
            return;
        };
        for idx in self.descendants() {
            if self.nodes[idx].depth == max_depth {
                self.nodes[idx].children.clear();
            }
        }
    }
}

pub(super) fn build(
    store: &mut RelationStore,
    main: &PersonId,
    side: Side,
    hooks: &Hooks<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Hierarchy {
    let mut hierarchy = Hierarchy {
        nodes: vec![HNode::new(main.clone(), None, 0)],
    };
    let walk = match side {
        Side::Progeny => WalkKind::Progeny,
        Side::Ancestry => WalkKind::Ancestry,
    };
    let mut depth_capped = false;
    let mut queue = VecDeque::from([Hierarchy::ROOT]);
    while let Some(idx) = queue.pop_front() {
        let person = hierarchy.nodes[idx].person.clone();
        let depth = hierarchy.nodes[idx].depth;
        let next = match side {
            Side::Progeny => progeny_children(store, &person, hooks),
            Side::Ancestry => ancestry_parents(store, &person),
        };
        if next.is_empty() {
            continue;
        }
        if depth >= MAX_WALK_DEPTH {
            depth_capped = true;
            continue;
        }
        for id in next {
            if hierarchy.on_path_to_root(idx, &id) {
                diagnostics.push(Diagnostic::RelationCycle {
                    walk,
                    person: id.clone(),
                });
                continue;
            }
            let child = hierarchy.nodes.len();
            hierarchy.nodes.push(HNode::new(id, Some(idx), depth + 1));
            hierarchy.nodes[idx].children.push(child);
            queue.push_back(child);
        }
    }
    if depth_capped {
        diagnostics.push(Diagnostic::WalkLimit {
            walk,
            limit: MAX_WALK_DEPTH,
        });
    }
    hierarchy
}

fn ancestry_parents(store: &RelationStore, id: &PersonId) -> Vec<PersonId> {
    let Some(person) = store.get(id) else {
        return Vec::new();
    };
    person
        .rels
        .father
        .iter()
        .chain(person.rels.mother.iter())
        .filter(|p| store.contains(p))
        .cloned()
        .collect()
}

fn progeny_children(store: &mut RelationStore, id: &PersonId, hooks: &Hooks<'_>) -> Vec<PersonId> {
    if let Some(order) = hooks.sort_spouses {
        sort_spouses(store, id, order);
    }
    let store = &*store;
    let Some(person) = store.get(id) else {
        return Vec::new();
    };
    let mut children: Vec<&Person> = person
        .rels
        .children
        .iter()
        .filter_map(|c| store.get(c))
        .collect();
    if let Some(order) = hooks.sort_children {
        children.sort_by(|a, b| order(a, b));
    }
    children.sort_by_key(|c| c.new_relative.is_some());

    // Full siblings stay together, half-sibling groups follow the order of marriages.
    let rank = |child: &Person| -> i64 {
        other_parent(store, child, id)
            .and_then(|other| person.rels.spouses.iter().position(|s| s == other))
            .map_or(-1, |pos| pos as i64)
    };
    if person.is_male() {
        children.sort_by_key(|c| rank(*c));
    } else {
        children.sort_by_key(|c| Reverse(rank(*c)));
    }
    children.into_iter().map(|c| c.id.clone()).collect()
}

/// The parent of `child` other than `parent`, preferring whichever comes first in the store.
fn other_parent<'a>(
    store: &RelationStore,
    child: &'a Person,
    parent: &PersonId,
) -> Option<&'a PersonId> {
    child
        .rels
        .father
        .iter()
        .chain(child.rels.mother.iter())
        .filter(|p| *p != parent)
        .filter_map(|p| store.position(p).map(|pos| (pos, p)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, p)| p)
}

fn sort_spouses(
    store: &mut RelationStore,
    id: &PersonId,
    order: &dyn Fn(&Person, &Person) -> Ordering,
) {
    let Some(mut spouses) = store.get(id).map(|p| p.rels.spouses.clone()) else {
        return;
    };
    spouses.sort_by(|a, b| match (store.get(a), store.get(b)) {
        (Some(a), Some(b)) => order(a, b),
        _ => Ordering::Equal,
    });
    if let Some(person) = store.get_mut(id) {
        person.rels.spouses = spouses;
    }
}

struct SeparationInfo {
    parent: Option<usize>,
    father: Option<PersonId>,
    mother: Option<PersonId>,
    spouses: usize,
}

/// Sibling gap on the progeny side; spouse slots are reserved here and filled in later.
pub(super) fn progeny_separation(
    hierarchy: &Hierarchy,
    store: &RelationStore,
) -> impl Fn(usize, usize) -> f64 + use<> {
    let info: Vec<SeparationInfo> = hierarchy
        .nodes
        .iter()
        .map(|node| {
            let person = store.get(&node.person);
            SeparationInfo {
                parent: node.parent,
                father: person.and_then(|p| p.rels.father.clone()),
                mother: person.and_then(|p| p.rels.mother.clone()),
                spouses: person.map_or(0, |p| {
                    p.rels.spouses.iter().filter(|s| store.contains(s)).count()
                }),
            }
        })
        .collect();
    move |a, b| {
        let (a, b) = (&info[a], &info[b]);
        let same_parent = a.parent == b.parent;
        let mut offset = 1.0;
        if !same_parent {
            offset += 0.25;
        }
        if a.spouses > 0 || b.spouses > 0 {
            offset += 0.5 * (a.spouses + b.spouses) as f64;
        }
        if same_parent && !(a.father == b.father && a.mother == b.mother) {
            offset += 0.125;
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::{Gender, Relations};

    fn no_hooks() -> Hooks<'static> {
        Hooks {
            sort_children: None,
            sort_spouses: None,
            private_condition: None,
        }
    }

    fn family() -> RelationStore {
        // P has two marriages; children are listed out of marriage order.
        let child = |id: &str, mother: &str| {
            Person::new(id).with_rels(Relations {
                father: Some("P".into()),
                mother: Some(mother.into()),
                ..Relations::default()
            })
        };
        RelationStore::from_persons(vec![
            Person::new("P").with_gender(Gender::Male).with_rels(Relations {
                spouses: vec!["W1".into(), "W2".into()],
                children: vec!["b1".into(), "a1".into(), "b2".into(), "a2".into()],
                ..Relations::default()
            }),
            Person::new("W1").with_gender(Gender::Female),
            Person::new("W2").with_gender(Gender::Female),
            child("b1", "W2"),
            child("a1", "W1"),
            child("b2", "W2"),
            child("a2", "W1"),
        ])
        .expect("store")
    }

    fn persons(h: &Hierarchy) -> Vec<&str> {
        h.descendants()
            .into_iter()
            .map(|i| h.nodes[i].person.as_str())
            .collect()
    }

    #[test]
    fn children_follow_marriage_order() {
        let mut store = family();
        let mut diagnostics = Vec::new();
        let h = build(&mut store, &"P".into(), Side::Progeny, &no_hooks(), &mut diagnostics);
        assert_eq!(persons(&h), vec!["P", "a1", "a2", "b1", "b2"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn female_anchor_reverses_marriage_order() {
        let mut store = family();
        store.get_mut(&"P".into()).expect("P").data.gender = Some(Gender::Female);
        let mut diagnostics = Vec::new();
        let h = build(&mut store, &"P".into(), Side::Progeny, &no_hooks(), &mut diagnostics);
        assert_eq!(persons(&h), vec!["P", "b1", "b2", "a1", "a2"]);
    }

    #[test]
    fn ancestry_pairs_and_trim() {
        let mut store = RelationStore::from_persons(vec![
            Person::new("C").with_rels(Relations {
                father: Some("F".into()),
                mother: Some("M".into()),
                ..Relations::default()
            }),
            Person::new("F").with_rels(Relations {
                father: Some("GF".into()),
                ..Relations::default()
            }),
            Person::new("M"),
            Person::new("GF"),
        ])
        .expect("store");
        let mut diagnostics = Vec::new();
        let mut h = build(&mut store, &"C".into(), Side::Ancestry, &no_hooks(), &mut diagnostics);
        h.link_pairs();
        assert_eq!(h.nodes[1].pair_partner, Some(2));
        assert_eq!(persons(&h), vec!["C", "F", "M", "GF"]);
        h.trim(Some(1));
        assert_eq!(persons(&h), vec!["C", "F", "M"]);
        h.trim(Some(0));
        assert_eq!(persons(&h), vec!["C"]);
    }

    #[test]
    fn cycles_are_cut_with_a_diagnostic() {
        let mut store = RelationStore::from_persons(vec![
            Person::new("A").with_rels(Relations {
                father: Some("B".into()),
                ..Relations::default()
            }),
            Person::new("B").with_rels(Relations {
                father: Some("A".into()),
                ..Relations::default()
            }),
        ])
        .expect("store");
        let mut diagnostics = Vec::new();
        let h = build(&mut store, &"A".into(), Side::Ancestry, &no_hooks(), &mut diagnostics);
        assert_eq!(persons(&h), vec!["A", "B"]);
        assert!(matches!(diagnostics[..], [Diagnostic::RelationCycle { .. }]));
    }

    #[test]
    fn separation_reserves_spouse_room() {
        let mut store = family();
        store.get_mut(&"a1".into()).expect("a1").rels.spouses = vec!["W1".into()];
        let mut diagnostics = Vec::new();
        let h = build(&mut store, &"P".into(), Side::Progeny, &no_hooks(), &mut diagnostics);
        let sep = progeny_separation(&h, &store);
        // a1 (1 spouse) next to a2: full siblings
        assert_eq!(sep(2, 1), 1.5);
        // a2 next to b1: half siblings
        assert_eq!(sep(3, 2), 1.125);
    }
}
