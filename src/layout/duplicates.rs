use crate::person::PersonId;
use crate::store::{BranchParent, DEFAULT_PRIORITY, DuplicateToggleState, RelationStore, ToggleKey};
use std::collections::HashMap;

use super::hierarchy::Hierarchy;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct DuplicateMember {
    pub node: usize,
    pub key: ToggleKey,
}

pub(super) type DuplicateGroup = Vec<DuplicateMember>;

fn branch_of(hierarchy: &Hierarchy, node: usize) -> BranchParent {
    match hierarchy.nodes[node].parent {
        Some(parent) if node != Hierarchy::ROOT => {
            BranchParent::Person(hierarchy.nodes[parent].person.clone())
        }
        _ => BranchParent::Main,
    }
}

fn existing_spouses(store: &RelationStore, person: &PersonId) -> Vec<PersonId> {
    store
        .get(person)
        .map(|p| {
            p.rels
                .spouses
                .iter()
                .filter(|s| store.contains(s))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Children of `node` grouped by their other parent.
fn children_by_partner(
    hierarchy: &Hierarchy,
    store: &RelationStore,
    node: usize,
) -> HashMap<Option<PersonId>, Vec<usize>> {
    let parent = &hierarchy.nodes[node].person;
    let mut groups: HashMap<Option<PersonId>, Vec<usize>> = HashMap::new();
    for &child in &hierarchy.nodes[node].children {
        let other = store.get(&hierarchy.nodes[child].person).and_then(|c| {
            if c.rels.father.as_ref() == Some(parent) {
                c.rels.mother.clone()
            } else {
                c.rels.father.clone()
            }
        });
        groups.entry(other).or_default().push(child);
    }
    groups
}

/// True when both members of `couple` are in `other`.
fn same_couple(couple: [&PersonId; 2], other: [&PersonId; 2]) -> bool {
    couple.iter().all(|id| other.contains(id))
}

/// Index of the highest priority, earliest member first on ties.
fn strongest(values: &[i64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &value) in values.iter().enumerate() {
        if best.is_none_or(|b| value > values[b]) {
            best = Some(i);
        }
    }
    best
}

/// Reads (or initializes as collapsed) every member's priority and keeps at most one
/// member expanded.
fn settle_priorities(
    group: &DuplicateGroup,
    toggles: &mut DuplicateToggleState,
    close_others: bool,
) {
    let values: Vec<i64> = group
        .iter()
        .map(|m| toggles.get_or_init(&m.key, -DEFAULT_PRIORITY))
        .collect();
    if !close_others {
        return;
    }
    if values.iter().all(|&v| v < 0) {
        if let Some(best) = strongest(&values) {
            toggles.set(&group[best].key, DEFAULT_PRIORITY);
        }
    }
    if values.iter().filter(|&&v| v > 0).count() > 1 {
        if let Some(latest) = strongest(&values) {
            for (i, member) in group.iter().enumerate() {
                if i != latest {
                    toggles.set(&member.key, -DEFAULT_PRIORITY);
                }
            }
        }
    }
}

fn is_collapsed(toggles: &DuplicateToggleState, key: &ToggleKey) -> bool {
    toggles.get(key).is_some_and(|v| v < 0)
}

struct ProgenyPass<'a> {
    hierarchy: &'a mut Hierarchy,
    store: &'a RelationStore,
    toggles: &'a mut DuplicateToggleState,
    close_others: bool,
    groups: Vec<DuplicateGroup>,
}

impl ProgenyPass<'_> {
    fn key(&self, node: usize, partner: &PersonId) -> ToggleKey {
        ToggleKey::new(
            self.hierarchy.nodes[node].person.clone(),
            branch_of(self.hierarchy, node),
            Some(partner.clone()),
        )
    }

    fn visit(&mut self, node: usize) {
        if self.hierarchy.nodes[node].children.is_empty() {
            return;
        }
        let owner = self.hierarchy.nodes[node].person.clone();
        let by_partner = children_by_partner(self.hierarchy, self.store, node);
        for partner in existing_spouses(self.store, &owner) {
            let known = self.groups.iter().flatten().any(|m| {
                let seen_partner = m.key.partner.as_ref().unwrap_or(&m.key.owner);
                same_couple([&owner, &partner], [&m.key.owner, seen_partner])
            });
            if known {
                continue;
            }
            let duplicates = self.find(node, &owner, &partner);
            if duplicates.is_empty() {
                let key = self.key(node, &partner);
                self.toggles.stash(&key);
                for &child in by_partner.get(&Some(partner.clone())).into_iter().flatten() {
                    self.visit(child);
                }
                continue;
            }
            let mut group = vec![DuplicateMember {
                node,
                key: self.key(node, &partner),
            }];
            group.extend(duplicates);
            settle_priorities(&group, self.toggles, self.close_others);
            self.collapse(&group);
            self.groups.push(group);
        }
    }

    /// Other nodes in the hierarchy where the same couple heads a branch.
    fn find(&self, datum: usize, p1: &PersonId, p2: &PersonId) -> Vec<DuplicateMember> {
        let mut found = Vec::new();
        self.find_from(Hierarchy::ROOT, datum, [p1, p2], &mut found);
        found
    }

    fn find_from(
        &self,
        node: usize,
        datum: usize,
        couple: [&PersonId; 2],
        found: &mut Vec<DuplicateMember>,
    ) {
        if node == datum || self.hierarchy.nodes[node].children.is_empty() {
            return;
        }
        let owner = &self.hierarchy.nodes[node].person;
        let by_partner = children_by_partner(self.hierarchy, self.store, node);
        for partner in existing_spouses(self.store, owner) {
            if same_couple(couple, [owner, &partner]) {
                found.push(DuplicateMember {
                    node,
                    key: self.key(node, &partner),
                });
            } else if let Some(children) = by_partner.get(&Some(partner)) {
                for &child in children {
                    self.find_from(child, datum, couple, found);
                }
            }
        }
    }

    fn collapse(&mut self, group: &DuplicateGroup) {
        for member in group {
            if !is_collapsed(self.toggles, &member.key) {
                continue;
            }
            let by_partner = children_by_partner(self.hierarchy, self.store, member.node);
            if let Some(hidden) = by_partner.get(&member.key.partner) {
                self.hierarchy.nodes[member.node]
                    .children
                    .retain(|c| !hidden.contains(c));
            }
        }
    }
}

/// Groups marriages that head the same branch more than once and prunes the collapsed
/// copies. Toggle entries of marriages that are no longer duplicated go dormant.
pub(super) fn collapse_progeny(
    hierarchy: &mut Hierarchy,
    store: &mut RelationStore,
    close_others: bool,
) -> Vec<DuplicateGroup> {
    let mut toggles = std::mem::take(store.toggles_mut());
    let groups = {
        let mut pass = ProgenyPass {
            hierarchy,
            store: &*store,
            toggles: &mut toggles,
            close_others,
            groups: Vec::new(),
        };
        pass.visit(Hierarchy::ROOT);
        pass.groups
    };
    *store.toggles_mut() = toggles;
    groups
}

/// Groups ancestry nodes whose parents already appear under another node and prunes the
/// collapsed copies.
pub(super) fn collapse_ancestry(
    hierarchy: &mut Hierarchy,
    store: &mut RelationStore,
    close_others: bool,
) -> Vec<DuplicateGroup> {
    let toggles = store.toggles_mut();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut stack = vec![Hierarchy::ROOT];
    while let Some(node) = stack.pop() {
        if hierarchy.nodes[node].children.is_empty() {
            continue;
        }
        if groups.iter().flatten().any(|m| m.node == node) {
            continue;
        }
        let duplicates = find_ancestry(hierarchy, node);
        if duplicates.is_empty() {
            stack.extend(hierarchy.nodes[node].children.iter().rev().copied());
            continue;
        }
        let group: DuplicateGroup = std::iter::once(node)
            .chain(duplicates)
            .map(|n| DuplicateMember {
                node: n,
                key: ToggleKey::new(
                    hierarchy.nodes[n].person.clone(),
                    branch_of(hierarchy, n),
                    None,
                ),
            })
            .collect();
        settle_priorities(&group, toggles, close_others);
        for member in &group {
            if is_collapsed(toggles, &member.key) {
                hierarchy.nodes[member.node].children.clear();
            }
        }
        groups.push(group);
    }
    groups
}

fn find_ancestry(hierarchy: &Hierarchy, datum: usize) -> Vec<usize> {
    let wanted: Vec<&PersonId> = hierarchy.nodes[datum]
        .children
        .iter()
        .map(|&c| &hierarchy.nodes[c].person)
        .collect();
    let mut found = Vec::new();
    let mut stack = vec![Hierarchy::ROOT];
    while let Some(node) = stack.pop() {
        let children = &hierarchy.nodes[node].children;
        if children.is_empty() {
            continue;
        }
        let covers = node != datum
            && wanted
                .iter()
                .all(|id| children.iter().any(|&c| hierarchy.nodes[c].person == **id));
        if covers {
            found.push(node);
        } else {
            stack.extend(children.iter().rev().copied());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::hierarchy::{Side, build};
    use crate::layout::Hooks;
    use crate::person::{Gender, Person, Relations};

    fn hooks() -> Hooks<'static> {
        Hooks {
            sort_children: None,
            sort_spouses: None,
            private_condition: None,
        }
    }

    fn rels(
        father: Option<&str>,
        mother: Option<&str>,
        spouses: &[&str],
        children: &[&str],
    ) -> Relations {
        Relations {
            father: father.map(Into::into),
            mother: mother.map(Into::into),
            spouses: spouses.iter().map(|s| (*s).into()).collect(),
            children: children.iter().map(|c| (*c).into()).collect(),
        }
    }

    /// Two grandchildren of P through different children marry each other.
    fn cousins_marriage() -> RelationStore {
        let p = |id: &str, g: Gender, r: Relations| Person::new(id).with_gender(g).with_rels(r);
        RelationStore::from_persons(vec![
            p("P", Gender::Male, rels(None, None, &["Q"], &["A", "B"])),
            p("Q", Gender::Female, rels(None, None, &["P"], &["A", "B"])),
            p("A", Gender::Male, rels(Some("P"), Some("Q"), &["SA"], &["C"])),
            p("SA", Gender::Female, rels(None, None, &["A"], &["C"])),
            p("B", Gender::Female, rels(Some("P"), Some("Q"), &["SB"], &["D"])),
            p("SB", Gender::Male, rels(None, None, &["B"], &["D"])),
            p("C", Gender::Male, rels(Some("A"), Some("SA"), &["D"], &["X", "Y"])),
            p("D", Gender::Female, rels(Some("SB"), Some("B"), &["C"], &["X", "Y"])),
            p("X", Gender::Male, rels(Some("C"), Some("D"), &[], &[])),
            p("Y", Gender::Female, rels(Some("C"), Some("D"), &[], &[])),
        ])
        .expect("store")
    }

    fn visible(h: &Hierarchy) -> Vec<&str> {
        h.descendants()
            .into_iter()
            .map(|i| h.nodes[i].person.as_str())
            .collect()
    }

    #[test]
    fn progeny_duplicate_keeps_one_branch() {
        let mut store = cousins_marriage();
        let mut diagnostics = Vec::new();
        let mut h = build(&mut store, &"P".into(), Side::Progeny, &hooks(), &mut diagnostics);
        let groups = collapse_progeny(&mut h, &mut store, true);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        let shown = visible(&h);
        assert_eq!(shown.iter().filter(|p| **p == "X").count(), 1);
        // the branch found first stays open
        let expanded: Vec<_> = groups[0]
            .iter()
            .filter(|m| store.toggles().get(&m.key).is_some_and(|v| v > 0))
            .map(|m| m.key.owner.as_str())
            .collect();
        assert_eq!(expanded, vec!["C"]);
    }

    #[test]
    fn toggling_moves_the_expanded_branch() {
        let mut store = cousins_marriage();
        let mut diagnostics = Vec::new();
        let mut h = build(&mut store, &"P".into(), Side::Progeny, &hooks(), &mut diagnostics);
        let groups = collapse_progeny(&mut h, &mut store, true);
        let collapsed = groups[0][1].key.clone();
        assert!(store.toggle_duplicate(&collapsed).is_some_and(|v| v > 0));

        let mut h = build(&mut store, &"P".into(), Side::Progeny, &hooks(), &mut diagnostics);
        let groups = collapse_progeny(&mut h, &mut store, true);
        let open: Vec<_> = groups[0]
            .iter()
            .filter(|m| store.toggles().get(&m.key).is_some_and(|v| v > 0))
            .map(|m| m.key.clone())
            .collect();
        assert_eq!(open, vec![collapsed]);
    }

    #[test]
    fn without_close_others_all_may_collapse() {
        let mut store = cousins_marriage();
        let mut diagnostics = Vec::new();
        let mut h = build(&mut store, &"P".into(), Side::Progeny, &hooks(), &mut diagnostics);
        collapse_progeny(&mut h, &mut store, false);
        assert!(!visible(&h).contains(&"X"));
    }

    #[test]
    fn ancestry_duplicate_parents() {
        // M's parents F and Mo are siblings.
        let p = |id: &str, g: Gender, r: Relations| Person::new(id).with_gender(g).with_rels(r);
        let mut store = RelationStore::from_persons(vec![
            p("M", Gender::Male, rels(Some("F"), Some("Mo"), &[], &[])),
            p("F", Gender::Male, rels(Some("G1"), Some("G2"), &["Mo"], &["M"])),
            p("Mo", Gender::Female, rels(Some("G1"), Some("G2"), &["F"], &["M"])),
            p("G1", Gender::Male, rels(None, None, &["G2"], &["F", "Mo"])),
            p("G2", Gender::Female, rels(None, None, &["G1"], &["F", "Mo"])),
        ])
        .expect("store");
        let mut diagnostics = Vec::new();
        let mut h = build(&mut store, &"M".into(), Side::Ancestry, &hooks(), &mut diagnostics);
        let groups = collapse_ancestry(&mut h, &mut store, true);
        assert_eq!(groups.len(), 1);
        assert_eq!(visible(&h), vec!["M", "F", "Mo", "G1", "G2"]);
        let mo = &groups[0][1];
        assert_eq!(mo.key.owner.as_str(), "Mo");
        assert!(h.nodes[mo.node].children.is_empty());
    }

    #[test]
    fn strongest_prefers_earliest_on_ties() {
        assert_eq!(strongest(&[-1, -1]), Some(0));
        assert_eq!(strongest(&[1, 3, 3]), Some(1));
        assert_eq!(strongest(&[]), None);
    }
}
