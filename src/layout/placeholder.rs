use crate::person::{Gender, Person, PersonId};
use crate::store::RelationStore;

/// Gives every child with a single known parent a synthetic second parent, shared by all
/// such children of that parent. Returns the ids of the created placeholders.
pub(super) fn expand(store: &mut RelationStore) -> Vec<PersonId> {
    let mut created = Vec::new();
    let ids: Vec<PersonId> = store.persons().iter().map(|p| p.id.clone()).collect();
    for id in ids {
        let Some(person) = store.get(&id) else {
            continue;
        };
        if person.rels.children.is_empty() {
            continue;
        }
        let is_father = person.is_male();
        let children = person.rels.children.clone();
        let mut spouse: Option<PersonId> = None;
        for child_id in children {
            let Some(child) = store.get(&child_id) else {
                continue;
            };
            let (own, other) = if is_father {
                (&child.rels.father, &child.rels.mother)
            } else {
                (&child.rels.mother, &child.rels.father)
            };
            if own.as_ref() != Some(&id) || other.is_some() {
                continue;
            }
            let spouse_id = match &spouse {
                Some(existing) => existing.clone(),
                None => {
                    let gender = if is_father {
                        Gender::Female
                    } else {
                        Gender::Male
                    };
                    let mut placeholder = Person::empty().with_gender(gender);
                    placeholder.to_add = true;
                    placeholder.rels.spouses = vec![id.clone()];
                    let placeholder_id = placeholder.id.clone();
                    store.push(placeholder);
                    if let Some(person) = store.get_mut(&id) {
                        person.rels.spouses.push(placeholder_id.clone());
                    }
                    created.push(placeholder_id.clone());
                    spouse = Some(placeholder_id.clone());
                    placeholder_id
                }
            };
            if let Some(placeholder) = store.get_mut(&spouse_id) {
                placeholder.rels.children.push(child_id.clone());
            }
            if let Some(child) = store.get_mut(&child_id) {
                if is_father {
                    child.rels.mother = Some(spouse_id);
                } else {
                    child.rels.father = Some(spouse_id);
                }
            }
        }
    }
    if !created.is_empty() {
        tracing::debug!(count = created.len(), "created placeholder parents");
    }
    created
}
