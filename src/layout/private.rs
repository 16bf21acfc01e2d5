use crate::config::PersonPredicate;
use crate::person::PersonId;
use crate::store::RelationStore;
use std::collections::{HashMap, HashSet};

use super::types::TreeNode;

/// A person is private when the condition holds for them or for anyone reachable through
/// father, mother and spouse links, stopping at in-progress relatives.
struct PrivacyCheck<'a> {
    store: &'a RelationStore,
    condition: &'a PersonPredicate,
    memo: HashMap<PersonId, bool>,
}

impl PrivacyCheck<'_> {
    fn is_private(&mut self, start: &PersonId) -> bool {
        if let Some(&known) = self.memo.get(start) {
            return known;
        }
        let mut visited: HashSet<&PersonId> = HashSet::from([start]);
        let mut stack = vec![start];
        let mut private = false;
        while let Some(id) = stack.pop() {
            if let Some(&known) = self.memo.get(id) {
                if known {
                    private = true;
                    break;
                }
                continue;
            }
            let Some(person) = self.store.get(id) else {
                continue;
            };
            if person.new_relative.is_some() {
                continue;
            }
            if (self.condition)(person) {
                private = true;
                break;
            }
            let stashed = self.store.stashed_relations(id);
            let next: Vec<&PersonId> = [&person.rels]
                .into_iter()
                .chain(stashed)
                .flat_map(|rels| {
                    rels.father
                        .iter()
                        .chain(rels.mother.iter())
                        .chain(rels.spouses.iter())
                })
                .filter(|next| visited.insert(*next))
                .collect();
            stack.extend(next.into_iter().rev());
        }
        self.memo.insert(start.clone(), private);
        private
    }
}

/// Flags every card whose person is private. Returns the number of flagged cards.
pub(super) fn mark(
    nodes: &mut [TreeNode],
    store: &RelationStore,
    condition: &PersonPredicate,
) -> usize {
    let mut check = PrivacyCheck {
        store,
        condition,
        memo: HashMap::new(),
    };
    let mut flagged = 0;
    for node in nodes.iter_mut() {
        let Some(person) = store.get(&node.person) else {
            continue;
        };
        if person.new_relative.is_some() {
            continue;
        }
        node.is_private = check.is_private(&node.person);
        flagged += usize::from(node.is_private);
    }
    flagged
}
