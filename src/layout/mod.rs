mod dimensions;
mod duplicates;
mod error;
mod hierarchy;
mod links;
mod merge;
mod path;
mod placeholder;
mod private;
mod siblings;
mod spouses;
mod tidy;
mod types;

pub use dimensions::center_on;
pub use error::{Diagnostic, WalkKind};
pub use types::*;

use crate::config::{LayoutConfig, LayoutHooks, PersonOrder, PersonPredicate};
use crate::person::{Person, PersonId};
use crate::store::RelationStore;
use std::collections::{HashMap, HashSet};

use duplicates::DuplicateGroup;
use hierarchy::Side;

/// Borrowed view of the callbacks active for one pass.
pub(crate) struct Hooks<'a> {
    pub sort_children: Option<&'a PersonOrder>,
    pub sort_spouses: Option<&'a PersonOrder>,
    pub private_condition: Option<&'a PersonPredicate>,
}

/// Lays out the family around `main_id` (or the store's focal person, or the first person).
///
/// The store is updated in place: placeholder parents are added when
/// `single_parent_empty_card` is set, and duplicate toggle state is read and settled.
pub fn compute_layout(
    store: &mut RelationStore,
    main_id: Option<&PersonId>,
    config: &LayoutConfig,
    hooks: &LayoutHooks,
) -> TreeLayout {
    let (config, mut diagnostics) = config.validate();
    let configured = LayoutHooks::from_config(&config);
    let hooks = Hooks {
        sort_children: hooks.sort_children.as_ref().or(configured.sort_children.as_ref()),
        sort_spouses: hooks.sort_spouses.as_ref().or(configured.sort_spouses.as_ref()),
        private_condition: hooks
            .private_condition
            .as_ref()
            .or(configured.private_condition.as_ref()),
    };
    if config.private_cards.is_some() && hooks.private_condition.is_none() {
        diagnostics.push(Diagnostic::MissingPrivateCondition);
    }
    let is_horizontal = config.is_horizontal;
    // Breadth and generation spacing trade places for horizontal trees.
    let (ns, ls) = if is_horizontal {
        (config.level_separation, config.node_separation)
    } else {
        (config.node_separation, config.level_separation)
    };

    let first = first_person(store, &mut diagnostics);
    if config.single_parent_empty_card {
        placeholder::expand(store);
    }
    let main = resolve_main(store, main_id, first, &mut diagnostics);

    let mut progeny = hierarchy::build(store, &main, Side::Progeny, &hooks, &mut diagnostics);
    let mut ancestry = hierarchy::build(store, &main, Side::Ancestry, &hooks, &mut diagnostics);
    ancestry.link_pairs();
    progeny.trim(config.progeny_depth);
    ancestry.trim(config.ancestry_depth);
    tracing::debug!(
        progeny = progeny.descendants().len(),
        ancestry = ancestry.descendants().len(),
        "built hierarchies"
    );

    let (progeny_groups, ancestry_groups) = if config.duplicate_branch_toggle {
        let close_others = config.on_toggle_one_close_others;
        (
            duplicates::collapse_progeny(&mut progeny, store, close_others),
            duplicates::collapse_ancestry(&mut ancestry, store, close_others),
        )
    } else {
        (Vec::new(), Vec::new())
    };
    if !progeny_groups.is_empty() || !ancestry_groups.is_empty() {
        tracing::debug!(
            progeny = progeny_groups.len(),
            ancestry = ancestry_groups.len(),
            "duplicate groups"
        );
    }

    let separation = hierarchy::progeny_separation(&progeny, store);
    tidy::place(&mut progeny, ns, ls, separation);
    tidy::place(&mut ancestry, ns, ls, |_, _| 1.0);

    let merge::Merged {
        mut nodes,
        progeny_slots,
        ancestry_slots,
    } = merge::merge(&progeny, &ancestry);
    spouses::place(&mut nodes, store, ns);
    if config.show_siblings_of_main {
        siblings::place(&mut nodes, store, ns, hooks.sort_children);
    }
    spouses::anchor_progeny_parents(&mut nodes, store, is_horizontal);
    merge::orient(&mut nodes, is_horizontal);

    for node in &mut nodes {
        node.is_main = node.person == main;
    }
    mark_relatives_displayed(&mut nodes, store);
    if let Some(condition) = hooks.private_condition {
        let flagged = private::mark(&mut nodes, store, condition);
        tracing::debug!(flagged, "private cards");
    }
    assign_tids(&mut nodes);
    connect_transitions(&mut nodes, store);
    attach_toggles(
        &mut nodes,
        store,
        [
            (Side::Progeny, &progeny_groups, &progeny_slots),
            (Side::Ancestry, &ancestry_groups, &ancestry_slots),
        ],
    );

    let links = links::build(&nodes, store, is_horizontal);
    let dim = dimensions::measure(&nodes, config.node_separation, config.level_separation);
    tracing::debug!(nodes = nodes.len(), links = links.len(), "layout computed");
    error::report(&diagnostics);

    TreeLayout {
        nodes,
        links,
        dim,
        main_id: main,
        is_horizontal,
        diagnostics,
    }
}

fn first_person(store: &mut RelationStore, diagnostics: &mut Vec<Diagnostic>) -> PersonId {
    if let Some(first) = store.first() {
        return first.id.clone();
    }
    let person = Person::empty();
    let id = person.id.clone();
    store.push(person);
    diagnostics.push(Diagnostic::EmptyStore(id.clone()));
    id
}

fn resolve_main(
    store: &RelationStore,
    requested: Option<&PersonId>,
    first: PersonId,
    diagnostics: &mut Vec<Diagnostic>,
) -> PersonId {
    match requested.or(store.main_id()) {
        Some(id) if store.contains(id) => id.clone(),
        Some(id) => {
            diagnostics.push(Diagnostic::MainNotFound {
                requested: id.clone(),
                fallback: first.clone(),
            });
            first
        }
        None => first,
    }
}

/// True on a card when every relative its person has in the store is shown somewhere.
fn mark_relatives_displayed(nodes: &mut [TreeNode], store: &RelationStore) {
    let shown: HashSet<PersonId> = nodes.iter().map(|n| n.person.clone()).collect();
    for node in nodes.iter_mut() {
        node.all_relatives_displayed = store.get(&node.person).is_none_or(|person| {
            person
                .rels
                .all_ids()
                .filter(|id| store.contains(id))
                .all(|id| shown.contains(id))
        });
    }
}

/// `{id}--x{n}` for the n-th card of a person shown more than once, otherwise the id.
fn assign_tids(nodes: &mut [TreeNode]) {
    let mut totals: HashMap<PersonId, usize> = HashMap::new();
    for node in nodes.iter() {
        *totals.entry(node.person.clone()).or_default() += 1;
    }
    let mut seen: HashMap<PersonId, usize> = HashMap::new();
    for node in nodes.iter_mut() {
        let total = totals.get(&node.person).copied().unwrap_or(1);
        if total > 1 {
            let n = seen.entry(node.person.clone()).or_default();
            *n += 1;
            node.tid = format!("{}--x{}", node.person, n);
            node.duplicate_count = Some(total);
        } else {
            node.tid = node.person.to_string();
        }
    }
}

/// Fills `from`/`to`: which cards each card grows out of and into.
fn connect_transitions(nodes: &mut [TreeNode], store: &RelationStore) {
    for idx in 0..nodes.len() {
        let node = &nodes[idx];
        if node.is_main || node.kind.is_sibling() {
            continue;
        }
        if node.is_ancestry {
            let from = node.parent.into_iter().collect();
            let to = node.parents.clone();
            let node = &mut nodes[idx];
            node.from = from;
            node.to = to;
            continue;
        }
        if node.kind.spouse_of().is_some() {
            continue;
        }
        let Some(p1) = node.parent else {
            continue;
        };
        let rels = store.get(&node.person).map(|p| &p.rels);
        let p2 = nodes[p1.0]
            .spouses
            .iter()
            .copied()
            .find(|s| rels.is_some_and(|rels| rels.is_parent(&nodes[s.0].person)));
        let me = NodeIdx(idx);
        nodes[idx].from = std::iter::once(p1).chain(p2).collect();
        nodes[p1.0].to.push(me);
        if let Some(p2) = p2 {
            nodes[p2.0].to.push(me);
        }
    }
}

type SideGroups<'a> = (Side, &'a Vec<DuplicateGroup>, &'a Vec<Option<NodeIdx>>);

/// Puts toggle affordances on cards. Group ids count up across both sides, progeny first.
fn attach_toggles(nodes: &mut [TreeNode], store: &RelationStore, sides: [SideGroups<'_>; 2]) {
    let groups = sides
        .iter()
        .flat_map(|(side, groups, slots)| groups.iter().map(move |g| (*side, g, *slots)));
    for (group_id, (side, group, slots)) in (1u32..).zip(groups) {
        for member in group {
            let Some(priority) = store.toggles().get(&member.key) else {
                continue;
            };
            let Some(owner) = slots.get(member.node).copied().flatten() else {
                continue;
            };
            let target = match side {
                Side::Ancestry => Some(owner),
                Side::Progeny => nodes[owner.0].spouses.iter().copied().find(|s| {
                    member.key.partner.as_ref() == Some(&nodes[s.0].person)
                }),
            };
            if let Some(target) = target {
                nodes[target.0].toggle = Some(DuplicateToggle {
                    group_id,
                    key: member.key.clone(),
                    priority,
                    expanded: priority > 0,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::{Gender, Relations};

    fn ids(ids: &[&str]) -> Vec<PersonId> {
        ids.iter().map(|id| (*id).into()).collect()
    }

    fn couple_with_kids() -> RelationStore {
        RelationStore::from_persons(vec![
            Person::new("H").with_gender(Gender::Male).with_rels(Relations {
                spouses: ids(&["W"]),
                children: ids(&["K1", "K2"]),
                ..Relations::default()
            }),
            Person::new("W").with_gender(Gender::Female).with_rels(Relations {
                spouses: ids(&["H"]),
                children: ids(&["K1", "K2"]),
                ..Relations::default()
            }),
            Person::new("K1").with_rels(Relations {
                father: Some("H".into()),
                mother: Some("W".into()),
                ..Relations::default()
            }),
            Person::new("K2").with_rels(Relations {
                father: Some("H".into()),
                mother: Some("W".into()),
                ..Relations::default()
            }),
        ])
        .expect("store")
    }

    #[test]
    fn couple_children_hang_from_midpoint() {
        let mut store = couple_with_kids();
        let layout = compute_layout(
            &mut store,
            None,
            &LayoutConfig::default(),
            &LayoutHooks::default(),
        );
        assert!(layout.diagnostics.is_empty());
        let main = layout.node(layout.main());
        assert_eq!(main.person.as_str(), "H");
        assert_eq!(main.x, -125.0);
        let wife = layout.nodes_of(&"W".into()).next().expect("W");
        assert_eq!(layout.node(wife).x, 125.0);
        let kids: Vec<&TreeNode> = layout.nodes.iter().filter(|n| n.depth == 1).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].x + kids[1].x, 0.0);
        assert!(kids.iter().all(|k| k.y == 150.0));
        assert!(kids.iter().all(|k| k.psx == Some(0.0)));
        assert!(kids.iter().all(|k| k.from == vec![NodeIdx(0), wife]));
        assert_eq!(layout.node(wife).to.len(), 2);
        assert!(layout.nodes.iter().all(|n| n.all_relatives_displayed));
    }

    #[test]
    fn missing_main_falls_back_to_first() {
        let mut store = couple_with_kids();
        let layout = compute_layout(
            &mut store,
            Some(&"nobody".into()),
            &LayoutConfig::default(),
            &LayoutHooks::default(),
        );
        assert_eq!(layout.main_id.as_str(), "H");
        assert!(matches!(layout.diagnostics[..], [Diagnostic::MainNotFound { .. }]));
    }

    #[test]
    fn empty_store_gets_a_person() {
        let mut store = RelationStore::new();
        let layout = compute_layout(
            &mut store,
            None,
            &LayoutConfig::default(),
            &LayoutHooks::default(),
        );
        assert_eq!(layout.nodes.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(matches!(layout.diagnostics[..], [Diagnostic::EmptyStore(_)]));
        assert_eq!(layout.dim.width, 250.0);
    }

    #[test]
    fn horizontal_swaps_axes() {
        let mut store = couple_with_kids();
        let config = LayoutConfig {
            is_horizontal: true,
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&mut store, None, &config, &LayoutHooks::default());
        let kids: Vec<&TreeNode> = layout.nodes.iter().filter(|n| n.depth == 1).collect();
        assert!(kids.iter().all(|k| k.x == 250.0));
        let main = layout.node(layout.main());
        assert_eq!((main.x, main.y), (0.0, -75.0));
    }

    #[test]
    fn progeny_depth_zero_hides_children() {
        let mut store = couple_with_kids();
        let config = LayoutConfig {
            progeny_depth: Some(0),
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&mut store, None, &config, &LayoutHooks::default());
        assert_eq!(layout.nodes.len(), 2);
        assert!(!layout.node(layout.main()).all_relatives_displayed);
    }

    #[test]
    fn private_cards_without_condition_are_reported() {
        let mut store = couple_with_kids();
        let config = LayoutConfig {
            private_cards: Some(Default::default()),
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&mut store, None, &config, &LayoutHooks::default());
        assert!(layout.diagnostics.contains(&Diagnostic::MissingPrivateCondition));
        assert!(layout.nodes.iter().all(|n| !n.is_private));
    }
}
