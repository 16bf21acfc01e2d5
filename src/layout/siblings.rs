use crate::config::PersonOrder;
use crate::person::{Person, PersonId};
use crate::store::RelationStore;

use super::types::{NodeIdx, NodeKind, TreeNode};

/// Adds the focal person's siblings at the focal level, laid out outward from the focal
/// couple. Siblings share at least one parent with the focal person.
pub(super) fn place(
    nodes: &mut Vec<TreeNode>,
    store: &RelationStore,
    node_separation: f64,
    sort_children: Option<&PersonOrder>,
) -> usize {
    let main = NodeIdx(0);
    let Some(focal) = store.get(&nodes[main.0].person) else {
        return 0;
    };
    let father = focal.rels.father.clone();
    let mother = focal.rels.mother.clone();
    let siblings: Vec<&Person> = store
        .persons()
        .iter()
        .filter(|p| p.id != focal.id)
        .filter(|p| {
            (father.is_some() && p.rels.father == father)
                || (mother.is_some() && p.rels.mother == mother)
        })
        .collect();
    if siblings.is_empty() {
        return 0;
    }
    let visible_parents = nodes[main.0].parents.clone();
    if visible_parents.is_empty() {
        tracing::debug!(count = siblings.len(), "siblings skipped, parents not shown");
        return 0;
    }
    let parent_node = |id: &Option<PersonId>| {
        id.as_ref().and_then(|id| {
            visible_parents
                .iter()
                .copied()
                .find(|p| nodes[p.0].person == *id)
        })
    };

    let mut row: Vec<(NodeIdx, &Person)> = vec![(main, focal)];
    let mut added = Vec::with_capacity(siblings.len());
    for sibling in siblings {
        let parents: Vec<NodeIdx> = [&sibling.rels.father, &sibling.rels.mother]
            .into_iter()
            .filter_map(parent_node)
            .collect();
        let mut node = TreeNode::new(sibling.id.clone(), NodeKind::Sibling { parents });
        node.y = nodes[main.0].y;
        node.depth = nodes[main.0].depth;
        added.push(node);
        row.push((NodeIdx(nodes.len() + added.len() - 1), sibling));
    }

    if let Some(order) = sort_children {
        row.sort_by(|a, b| order(a.1, b.1));
    }
    // Children missing a shown mother go left, those missing a shown father go right.
    row.sort_by_key(|(_, person)| {
        if parent_node(&person.rels.mother).is_none() {
            0
        } else if parent_node(&person.rels.father).is_none() {
            2
        } else {
            1
        }
    });

    let main_x = nodes[main.0].x;
    let (left, right) = nodes[main.0]
        .spouses
        .iter()
        .map(|s| nodes[s.0].x)
        .fold((main_x, main_x), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let Some(main_slot) = row.iter().position(|(idx, _)| *idx == main) else {
        return 0;
    };
    let count = added.len();
    let base = nodes.len();
    nodes.extend(added);
    for (i, (idx, _)) in row.iter().enumerate() {
        if i == main_slot {
            continue;
        }
        nodes[idx.0].x = if i < main_slot {
            left - node_separation * (main_slot - i) as f64
        } else {
            right + node_separation * (i - main_slot) as f64
        };
    }
    tracing::debug!(count, first = base, "placed siblings");
    count
}
