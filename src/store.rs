use crate::person::{Gender, NewRelative, Person, PersonId, RelType, Relations};
use std::collections::{HashMap, HashSet, VecDeque};

const MAIN_HISTORY_LEN: usize = 10;

/// Magnitude written by the layout itself; user toggles always stamp a larger one.
pub(crate) const DEFAULT_PRIORITY: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown person `{0}`")]
    UnknownPerson(PersonId),
    #[error("person `{0}` already exists")]
    DuplicateId(PersonId),
    #[error("`{0}` is not a synthetic placeholder")]
    NotPlaceholder(PersonId),
    #[error("removing `{0}` would disconnect some of their relatives from the main person")]
    WouldDisconnect(PersonId),
    #[error("`{person}` already has a {slot}")]
    ParentSlotTaken { person: PersonId, slot: &'static str },
    #[error("an edit transaction is already open")]
    EditInProgress,
    #[error("no edit transaction is open")]
    NoEditInProgress,
    #[error("invalid store json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a duplicate branch hangs from: the focal person, or the blood-line parent of the
/// node that owns the toggle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BranchParent {
    Main,
    Person(PersonId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToggleKey {
    pub owner: PersonId,
    pub branch: BranchParent,
    /// Progeny toggles are per marriage; ancestry toggles have no partner.
    pub partner: Option<PersonId>,
}

impl ToggleKey {
    pub fn new(owner: PersonId, branch: BranchParent, partner: Option<PersonId>) -> Self {
        Self {
            owner,
            branch,
            partner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ToggleEntry {
    priority: i64,
    dormant: bool,
}

/// Signed toggle priorities for duplicate branches: positive is expanded, negative is
/// collapsed, and a larger magnitude means a more recent toggle.
#[derive(Debug, Clone, Default)]
pub struct DuplicateToggleState {
    entries: HashMap<ToggleKey, ToggleEntry>,
    sequence: i64,
}

impl DuplicateToggleState {
    /// Priority of an active entry.
    pub fn get(&self, key: &ToggleKey) -> Option<i64> {
        self.entries
            .get(key)
            .filter(|entry| !entry.dormant)
            .map(|entry| entry.priority)
    }

    /// Active priority, reviving a dormant entry or inserting `default` when absent.
    pub(crate) fn get_or_init(&mut self, key: &ToggleKey, default: i64) -> i64 {
        let entry = self.entries.entry(key.clone()).or_insert(ToggleEntry {
            priority: default,
            dormant: false,
        });
        entry.dormant = false;
        entry.priority
    }

    pub(crate) fn set(&mut self, key: &ToggleKey, priority: i64) {
        self.entries.insert(
            key.clone(),
            ToggleEntry {
                priority,
                dormant: false,
            },
        );
    }

    /// Keeps the entry but hides it while its branch is not a duplicate.
    pub(crate) fn stash(&mut self, key: &ToggleKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.dormant = true;
        }
    }

    /// Flips expanded/collapsed and stamps the next sequence number.
    pub fn toggle(&mut self, key: &ToggleKey) -> Option<i64> {
        let entry = self.entries.get_mut(key).filter(|entry| !entry.dormant)?;
        self.sequence += 1;
        let stamp = DEFAULT_PRIORITY + self.sequence;
        entry.priority = if entry.priority < 0 { stamp } else { -stamp };
        Some(entry.priority)
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|entry| !entry.dormant).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget_person(&mut self, id: &PersonId) {
        self.entries.retain(|key, _| {
            key.owner != *id
                && key.partner.as_ref() != Some(id)
                && key.branch != BranchParent::Person(id.clone())
        });
    }
}

#[derive(Debug, Clone)]
pub enum OtherParent {
    Existing(PersonId),
    New,
}

#[derive(Debug, Clone)]
pub struct AddRelativeLabels {
    pub father: String,
    pub mother: String,
    pub spouse: String,
    pub son: String,
    pub daughter: String,
}

impl Default for AddRelativeLabels {
    fn default() -> Self {
        Self {
            father: "Add Father".to_string(),
            mother: "Add Mother".to_string(),
            spouse: "Add Spouse".to_string(),
            son: "Add Son".to_string(),
            daughter: "Add Daughter".to_string(),
        }
    }
}

impl AddRelativeLabels {
    fn label(&self, rel_type: RelType) -> String {
        match rel_type {
            RelType::Father => self.father.clone(),
            RelType::Mother => self.mother.clone(),
            RelType::Spouse => self.spouse.clone(),
            RelType::Son => self.son.clone(),
            RelType::Daughter => self.daughter.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct EditStash {
    relations: HashMap<PersonId, Relations>,
    created: Vec<PersonId>,
}

/// Gender a new relative gets from the relation it is added as.
pub fn gender_for_relation(rel_type: RelType, relative: Option<Gender>) -> Gender {
    let female = matches!(rel_type, RelType::Daughter | RelType::Mother)
        || (rel_type == RelType::Spouse && relative == Some(Gender::Male));
    if female { Gender::Female } else { Gender::Male }
}

fn parent_slot_name(gender: Option<Gender>) -> &'static str {
    if gender == Some(Gender::Male) {
        "father"
    } else {
        "mother"
    }
}

fn set_parent(rels: &mut Relations, gender: Option<Gender>, id: PersonId) {
    if gender == Some(Gender::Male) {
        rels.father = Some(id);
    } else {
        rels.mother = Some(id);
    }
}

fn push_unique(list: &mut Vec<PersonId>, id: &PersonId) {
    if !list.contains(id) {
        list.push(id.clone());
    }
}

/// Ordered owner of every [`Person`]. All relation traversal goes through id lookup here.
#[derive(Debug, Default)]
pub struct RelationStore {
    persons: Vec<Person>,
    index: HashMap<PersonId, usize>,
    toggles: DuplicateToggleState,
    main_id: Option<PersonId>,
    main_history: Vec<PersonId>,
    edit: Option<EditStash>,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persons(persons: Vec<Person>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for person in persons {
            store.add_person(person)?;
        }
        Ok(store)
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let persons: Vec<Person> = serde_json::from_str(raw)?;
        Self::from_persons(persons)
    }

    /// Clean interchange data: open edits are rolled back and provisional persons dropped.
    pub fn export(&self) -> Vec<Person> {
        let mut copy = Self {
            persons: self.persons.clone(),
            index: self.index.clone(),
            toggles: DuplicateToggleState::default(),
            main_id: None,
            main_history: Vec::new(),
            edit: None,
        };
        if let Some(edit) = &self.edit {
            copy.restore_exact(&edit.relations, &edit.created);
        }
        let provisional: Vec<PersonId> = copy
            .persons
            .iter()
            .filter(|p| p.is_provisional())
            .map(|p| p.id.clone())
            .collect();
        for id in provisional {
            copy.remove_unchecked(&id);
        }
        copy.persons
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn first(&self) -> Option<&Person> {
        self.persons.first()
    }

    pub fn get(&self, id: &PersonId) -> Option<&Person> {
        self.index.get(id).map(|&idx| &self.persons[idx])
    }

    pub fn get_mut(&mut self, id: &PersonId) -> Option<&mut Person> {
        self.index.get(id).map(|&idx| &mut self.persons[idx])
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.index.contains_key(id)
    }

    /// Position of `id` in store order.
    pub fn position(&self, id: &PersonId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn add_person(&mut self, person: Person) -> Result<(), StoreError> {
        if self.contains(&person.id) {
            return Err(StoreError::DuplicateId(person.id));
        }
        self.push(person);
        Ok(())
    }

    /// Appends a person whose id is known to be fresh.
    pub(crate) fn push(&mut self, person: Person) {
        if let Some(edit) = self.edit.as_mut() {
            edit.created.push(person.id.clone());
        }
        self.index.insert(person.id.clone(), self.persons.len());
        self.persons.push(person);
    }

    fn reindex(&mut self) {
        self.index = self
            .persons
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.id.clone(), idx))
            .collect();
    }

    fn remove_unchecked(&mut self, id: &PersonId) -> Option<Person> {
        let idx = *self.index.get(id)?;
        for person in &mut self.persons {
            person.rels.scrub(id);
        }
        let removed = self.persons.remove(idx);
        self.reindex();
        self.toggles.forget_person(id);
        Some(removed)
    }

    fn rels_mut(&mut self, id: &PersonId) -> Result<&mut Relations, StoreError> {
        self.get_mut(id)
            .map(|p| &mut p.rels)
            .ok_or_else(|| StoreError::UnknownPerson(id.clone()))
    }

    pub fn main_id(&self) -> Option<&PersonId> {
        self.main_id.as_ref()
    }

    pub fn update_main_id(&mut self, id: PersonId) {
        if self.main_id.as_ref() == Some(&id) {
            return;
        }
        self.main_history.retain(|h| *h != id);
        self.main_history.push(id.clone());
        if self.main_history.len() > MAIN_HISTORY_LEN {
            let overflow = self.main_history.len() - MAIN_HISTORY_LEN;
            self.main_history.drain(..overflow);
        }
        self.main_id = Some(id);
    }

    /// Most recent focal id that still exists, falling back to the first person.
    pub fn last_available_main(&mut self) -> Option<PersonId> {
        let id = self
            .main_history
            .iter()
            .rev()
            .find(|id| self.contains(id))
            .cloned()
            .or_else(|| self.first().map(|p| p.id.clone()))?;
        self.update_main_id(id.clone());
        Some(id)
    }

    fn connection_anchor(&self) -> Option<&PersonId> {
        self.main_id
            .as_ref()
            .filter(|id| self.contains(id))
            .or_else(|| self.first().map(|p| &p.id))
    }

    pub fn toggles(&self) -> &DuplicateToggleState {
        &self.toggles
    }

    pub(crate) fn toggles_mut(&mut self) -> &mut DuplicateToggleState {
        &mut self.toggles
    }

    pub fn toggle_duplicate(&mut self, key: &ToggleKey) -> Option<i64> {
        self.toggles.toggle(key)
    }

    /// True when every relative of `id` can still reach the main person without `id`.
    pub fn relatives_connected_without(&self, id: &PersonId) -> bool {
        let Some(person) = self.get(id) else {
            return true;
        };
        let Some(mut anchor) = self.connection_anchor() else {
            return true;
        };
        // Without the anchor itself, its relatives only need to stay connected to each other.
        if anchor == id {
            match person.rels.all_ids().find(|rel| self.contains(rel)) {
                Some(first) => anchor = first,
                None => return true,
            }
        }
        person
            .rels
            .all_ids()
            .filter(|rel_id| self.contains(rel_id))
            .all(|rel_id| self.reaches(rel_id, anchor, id))
    }

    fn reaches(&self, start: &PersonId, target: &PersonId, without: &PersonId) -> bool {
        if start == target {
            return true;
        }
        let mut seen: HashSet<&PersonId> = HashSet::from([start, without]);
        let mut queue: VecDeque<&PersonId> = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let Some(person) = self.get(current) else {
                continue;
            };
            for next in person.rels.all_ids() {
                if next == target {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Deletes a person, then every synthetic placeholder so the next layout regenerates them.
    pub fn delete_person(&mut self, id: &PersonId) -> Result<Person, StoreError> {
        if !self.contains(id) {
            return Err(StoreError::UnknownPerson(id.clone()));
        }
        if !self.relatives_connected_without(id) {
            return Err(StoreError::WouldDisconnect(id.clone()));
        }
        let removed = self
            .remove_unchecked(id)
            .ok_or_else(|| StoreError::UnknownPerson(id.clone()))?;
        let placeholders: Vec<PersonId> = self
            .persons
            .iter()
            .filter(|p| p.to_add)
            .map(|p| p.id.clone())
            .collect();
        for placeholder in placeholders {
            self.remove_unchecked(&placeholder);
        }
        if self.persons.is_empty() {
            self.push(Person::empty());
        }
        Ok(removed)
    }

    /// Removes a synthetic placeholder; other persons only lose references to it.
    pub fn remove_placeholder(&mut self, id: &PersonId) -> Result<Person, StoreError> {
        match self.get(id) {
            None => Err(StoreError::UnknownPerson(id.clone())),
            Some(p) if !p.to_add => Err(StoreError::NotPlaceholder(id.clone())),
            Some(_) => self
                .remove_unchecked(id)
                .ok_or_else(|| StoreError::UnknownPerson(id.clone())),
        }
    }

    /// Turns a placeholder into a regular person once the caller filled it in.
    pub fn confirm_placeholder(&mut self, id: &PersonId) -> Result<(), StoreError> {
        let person = self
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownPerson(id.clone()))?;
        person.to_add = false;
        Ok(())
    }

    /// Adds `person` as a `rel_type` of `of`, keeping relations reciprocal.
    pub fn add_relative(
        &mut self,
        of: &PersonId,
        rel_type: RelType,
        person: Person,
        other_parent: Option<OtherParent>,
    ) -> Result<PersonId, StoreError> {
        let anchor_gender = self
            .get(of)
            .ok_or_else(|| StoreError::UnknownPerson(of.clone()))?
            .gender();
        let new_id = person.id.clone();
        let new_gender = person.gender();
        if rel_type.is_parent() {
            let slot_holder = self
                .get(of)
                .and_then(|p| p.rels.parent(new_gender.unwrap_or(Gender::Female)).cloned());
            if let Some(holder) = slot_holder {
                if self.get(&holder).is_some_and(|p| p.to_add) {
                    self.remove_unchecked(&holder);
                } else {
                    return Err(StoreError::ParentSlotTaken {
                        person: of.clone(),
                        slot: parent_slot_name(new_gender),
                    });
                }
            }
        }
        self.add_person(person)?;

        match rel_type {
            RelType::Son | RelType::Daughter => {
                if let Some(other) = other_parent {
                    let spouse_id = match other {
                        OtherParent::Existing(id) => id,
                        OtherParent::New => {
                            let gender = gender_for_relation(RelType::Spouse, anchor_gender);
                            let spouse = Person::empty().with_gender(gender);
                            let spouse_id = spouse.id.clone();
                            self.push(spouse);
                            self.link_spouse(of, &spouse_id)?;
                            spouse_id
                        }
                    };
                    let spouse_gender = self
                        .get(&spouse_id)
                        .ok_or_else(|| StoreError::UnknownPerson(spouse_id.clone()))?
                        .gender();
                    set_parent(self.rels_mut(&new_id)?, spouse_gender, spouse_id.clone());
                    push_unique(&mut self.rels_mut(&spouse_id)?.children, &new_id);
                }
                set_parent(self.rels_mut(&new_id)?, anchor_gender, of.clone());
                push_unique(&mut self.rels_mut(of)?.children, &new_id);
            }
            RelType::Father | RelType::Mother => {
                set_parent(self.rels_mut(of)?, new_gender, new_id.clone());
                let other_parent = {
                    let rels = &self.rels_mut(of)?;
                    if new_gender == Some(Gender::Male) {
                        rels.mother.clone()
                    } else {
                        rels.father.clone()
                    }
                };
                if let Some(other) = other_parent.filter(|id| self.contains(id)) {
                    self.rels_mut(&new_id)?.spouses = vec![other.clone()];
                    push_unique(&mut self.rels_mut(&other)?.spouses, &new_id);
                }
                self.rels_mut(&new_id)?.children = vec![of.clone()];
            }
            RelType::Spouse => {
                self.link_spouse(of, &new_id)?;
            }
        }
        Ok(new_id)
    }

    /// Reciprocal spouse link; synthetic spouses of `of` are removed first.
    fn link_spouse(&mut self, of: &PersonId, spouse: &PersonId) -> Result<(), StoreError> {
        let synthetic: Vec<PersonId> = self
            .get(of)
            .map(|p| p.rels.spouses.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|id| id != spouse && self.get(id).is_some_and(|p| p.to_add))
            .collect();
        for id in synthetic {
            self.remove_unchecked(&id);
        }
        push_unique(&mut self.rels_mut(of)?.spouses, spouse);
        let rels = self.rels_mut(spouse)?;
        rels.spouses = vec![of.clone()];
        Ok(())
    }

    /// Replaces the new or placeholder person `new_id` by the existing `existing_id`.
    pub fn link_existing_relative(
        &mut self,
        new_id: &PersonId,
        existing_id: &PersonId,
    ) -> Result<(), StoreError> {
        let new_rels = self
            .get(new_id)
            .ok_or_else(|| StoreError::UnknownPerson(new_id.clone()))?
            .rels
            .clone();
        if !self.contains(existing_id) {
            return Err(StoreError::UnknownPerson(existing_id.clone()));
        }
        for person in &mut self.persons {
            person.rels.replace(new_id, existing_id);
        }
        let existing = self.rels_mut(existing_id)?;
        for child in &new_rels.children {
            push_unique(&mut existing.children, child);
        }
        for spouse in &new_rels.spouses {
            push_unique(&mut existing.spouses, spouse);
        }
        if existing.father.is_some() && new_rels.father.is_some() {
            tracing::warn!(person = %existing_id, "linked relative already has a father");
        }
        if existing.mother.is_some() && new_rels.mother.is_some() {
            tracing::warn!(person = %existing_id, "linked relative already has a mother");
        }
        if let Some(father) = new_rels.father {
            existing.father = Some(father);
        }
        if let Some(mother) = new_rels.mother {
            existing.mother = Some(mother);
        }
        existing.spouses.retain(|id| id != existing_id);
        existing.children.retain(|id| id != existing_id);
        self.remove_unchecked(new_id);
        Ok(())
    }

    /// Persons that may be linked in place of `id`.
    pub fn link_options(&self, id: &PersonId) -> Vec<PersonId> {
        let Some(person) = self.get(id) else {
            return Vec::new();
        };
        let anchor = person.new_relative.as_ref().map(|nr| &nr.rel_id);
        let ancestry = self.collect_lineage(id, true);
        let mut progeny = self.collect_lineage(id, false);
        if let (Some(nr), Some(anchor)) = (&person.new_relative, anchor)
            && nr.rel_type.is_child()
        {
            progeny.extend(self.collect_lineage(anchor, false));
        }
        self.persons
            .iter()
            .filter(|p| p.id != *id && Some(&p.id) != anchor && !p.is_provisional())
            .filter(|p| !ancestry.contains(&p.id) && !progeny.contains(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Ancestors (or descendants) of `id`, including relations hidden by an open edit.
    fn collect_lineage(&self, id: &PersonId, ancestors: bool) -> HashSet<PersonId> {
        let mut found = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let mut next: Vec<PersonId> = Vec::new();
            let rels = self.get(&current).map(|p| &p.rels);
            for rels in rels.into_iter().chain(self.stashed_relations(&current)) {
                if ancestors {
                    next.extend(rels.father.iter().chain(rels.mother.iter()).cloned());
                } else {
                    next.extend(rels.children.iter().cloned());
                }
            }
            for rel in next {
                if found.insert(rel.clone()) {
                    stack.push(rel);
                }
            }
        }
        found
    }

    pub fn edit_in_progress(&self) -> bool {
        self.edit.is_some()
    }

    pub fn begin_edit(&mut self) -> Result<(), StoreError> {
        if self.edit.is_some() {
            return Err(StoreError::EditInProgress);
        }
        self.edit = Some(EditStash::default());
        Ok(())
    }

    /// Relations of `id` as they were before the open edit touched them.
    pub fn stashed_relations(&self, id: &PersonId) -> Option<&Relations> {
        self.edit.as_ref().and_then(|edit| edit.relations.get(id))
    }

    fn stash(&mut self, id: &PersonId) {
        let Some(rels) = self.get(id).map(|p| p.rels.clone()) else {
            return;
        };
        if let Some(edit) = self.edit.as_mut() {
            edit.relations.entry(id.clone()).or_insert(rels);
        }
    }

    /// Keeps confirmed additions, drops still-marked new relatives and merges stashed
    /// relations back in.
    pub fn commit_edit(&mut self) -> Result<(), StoreError> {
        let edit = self.edit.take().ok_or(StoreError::NoEditInProgress)?;
        let marked: Vec<PersonId> = self
            .persons
            .iter()
            .filter(|p| p.new_relative.is_some())
            .map(|p| p.id.clone())
            .collect();
        for id in marked {
            self.remove_unchecked(&id);
        }
        for (id, stashed) in edit.relations {
            let Some(person) = self.get_mut(&id) else {
                continue;
            };
            let rels = &mut person.rels;
            if stashed.father.is_some() {
                rels.father = stashed.father;
            }
            if stashed.mother.is_some() {
                rels.mother = stashed.mother;
            }
            for child in &stashed.children {
                push_unique(&mut rels.children, child);
            }
            for spouse in &stashed.spouses {
                push_unique(&mut rels.spouses, spouse);
            }
        }
        Ok(())
    }

    /// Restores every stashed relation exactly and deletes persons created during the edit.
    pub fn rollback_edit(&mut self) -> Result<(), StoreError> {
        let edit = self.edit.take().ok_or(StoreError::NoEditInProgress)?;
        self.restore_exact(&edit.relations, &edit.created);
        Ok(())
    }

    fn restore_exact(&mut self, relations: &HashMap<PersonId, Relations>, created: &[PersonId]) {
        for id in created {
            self.remove_unchecked(id);
        }
        for (id, stashed) in relations {
            if let Some(person) = self.get_mut(id) {
                person.rels = stashed.clone();
            }
        }
    }

    /// Opens an edit that shows only the immediate family of `id` and materializes "new
    /// relative" placeholders around it.
    pub fn start_add_relative(
        &mut self,
        id: &PersonId,
        labels: &AddRelativeLabels,
    ) -> Result<(), StoreError> {
        let rels = self
            .get(id)
            .ok_or_else(|| StoreError::UnknownPerson(id.clone()))?
            .rels
            .clone();
        let gender = self.get(id).and_then(Person::gender);
        self.begin_edit()?;

        self.stash(id);
        for parent in rels.father.iter().chain(rels.mother.iter()) {
            self.stash(parent);
            if let Some(p) = self.get_mut(parent) {
                p.rels.father = None;
                p.rels.mother = None;
            }
        }
        for spouse in &rels.spouses {
            self.stash(spouse);
        }
        for child in &rels.children {
            self.stash(child);
            if let Some(c) = self.get_mut(child) {
                c.rels.children.clear();
                c.rels.spouses.clear();
            }
        }

        let marker = |rel_type: RelType, other_parent_id: Option<PersonId>| NewRelative {
            rel_type,
            label: labels.label(rel_type),
            rel_id: id.clone(),
            other_parent_id,
        };

        let father_id = match rels.father.clone().filter(|f| self.contains(f)) {
            Some(father) => father,
            None => {
                let mut father = Person::empty().with_gender(Gender::Male);
                father.new_relative = Some(marker(RelType::Father, None));
                let father_id = father.id.clone();
                self.push(father);
                self.rels_mut(id)?.father = Some(father_id.clone());
                father_id
            }
        };
        let mother_id = match rels.mother.clone().filter(|m| self.contains(m)) {
            Some(mother) => mother,
            None => {
                let mut mother = Person::empty().with_gender(Gender::Female);
                mother.new_relative = Some(marker(RelType::Mother, None));
                let mother_id = mother.id.clone();
                self.push(mother);
                self.rels_mut(id)?.mother = Some(mother_id.clone());
                mother_id
            }
        };
        {
            let father = self.rels_mut(&father_id)?;
            father.spouses = vec![mother_id.clone()];
            father.children = vec![id.clone()];
        }
        {
            let mother = self.rels_mut(&mother_id)?;
            mother.spouses = vec![father_id.clone()];
            mother.children = vec![id.clone()];
        }

        // Children with a single parent get one shared new co-parent.
        let mut co_parent: Option<PersonId> = None;
        for child_id in &rels.children {
            let Some(child) = self.get(child_id) else {
                continue;
            };
            let missing = match (&child.rels.father, &child.rels.mother) {
                (Some(_), None) => Some(Gender::Female),
                (None, Some(_)) => Some(Gender::Male),
                _ => None,
            };
            let Some(missing) = missing else {
                continue;
            };
            let spouse_id = match &co_parent {
                Some(existing) => existing.clone(),
                None => {
                    let mut spouse = Person::empty().with_gender(missing);
                    spouse.rels.spouses = vec![id.clone()];
                    spouse.new_relative = Some(marker(RelType::Spouse, None));
                    let spouse_id = spouse.id.clone();
                    self.push(spouse);
                    push_unique(&mut self.rels_mut(id)?.spouses, &spouse_id);
                    co_parent = Some(spouse_id.clone());
                    spouse_id
                }
            };
            push_unique(&mut self.rels_mut(&spouse_id)?.children, child_id);
            *self.rels_mut(child_id)?.parent_slot(missing) = Some(spouse_id);
        }

        let spouse_gender = if gender == Some(Gender::Male) {
            Gender::Female
        } else {
            Gender::Male
        };
        let mut new_spouse = Person::empty().with_gender(spouse_gender);
        new_spouse.rels.spouses = vec![id.clone()];
        new_spouse.new_relative = Some(marker(RelType::Spouse, None));
        let new_spouse_id = new_spouse.id.clone();
        self.push(new_spouse);
        push_unique(&mut self.rels_mut(id)?.spouses, &new_spouse_id);

        let spouses = self.rels_mut(id)?.spouses.clone();
        for spouse_id in spouses {
            if !self.contains(&spouse_id) {
                continue;
            }
            let (father, mother) = if gender == Some(Gender::Male) {
                (id.clone(), spouse_id.clone())
            } else {
                (spouse_id.clone(), id.clone())
            };
            let shared = self.rels_mut(id)?.children.clone();
            self.rels_mut(&spouse_id)?
                .children
                .retain(|c| shared.contains(c));
            let children = [
                (RelType::Son, Gender::Male),
                (RelType::Daughter, Gender::Female),
            ];
            for (rel_type, child_gender) in children {
                let mut child = Person::empty().with_gender(child_gender);
                child.rels.father = Some(father.clone());
                child.rels.mother = Some(mother.clone());
                child.new_relative = Some(marker(rel_type, Some(spouse_id.clone())));
                let child_id = child.id.clone();
                self.push(child);
                self.rels_mut(&spouse_id)?.children.push(child_id.clone());
                self.rels_mut(id)?.children.push(child_id);
            }
        }
        Ok(())
    }

    /// Keeps a new relative when the edit is committed.
    pub fn confirm_new_relative(&mut self, id: &PersonId) -> Result<(), StoreError> {
        let person = self
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownPerson(id.clone()))?;
        person.new_relative = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, gender: Gender, rels: Relations) -> Person {
        Person::new(id).with_gender(gender).with_rels(rels)
    }

    fn couple_with_child() -> RelationStore {
        RelationStore::from_persons(vec![
            person(
                "M",
                Gender::Male,
                Relations {
                    spouses: vec!["S".into()],
                    children: vec!["C".into()],
                    ..Relations::default()
                },
            ),
            person(
                "S",
                Gender::Female,
                Relations {
                    spouses: vec!["M".into()],
                    children: vec!["C".into()],
                    ..Relations::default()
                },
            ),
            person(
                "C",
                Gender::Male,
                Relations {
                    father: Some("M".into()),
                    mother: Some("S".into()),
                    ..Relations::default()
                },
            ),
        ])
        .expect("store")
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut store = couple_with_child();
        let err = store.add_person(Person::new("M")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));
    }

    #[test]
    fn delete_refuses_to_disconnect() {
        let mut store = couple_with_child();
        store.update_main_id("C".into());
        // S is reachable from C only through M's marriage or directly as mother; deleting M
        // keeps everyone connected.
        assert!(store.delete_person(&"M".into()).is_ok());
        assert!(store.get(&"S".into()).is_some_and(|s| s.rels.spouses.is_empty()));

        let mut chain = RelationStore::from_persons(vec![
            person("A", Gender::Male, Relations {
                children: vec!["B".into()],
                ..Relations::default()
            }),
            person("B", Gender::Male, Relations {
                father: Some("A".into()),
                children: vec!["C".into()],
                ..Relations::default()
            }),
            person("C", Gender::Male, Relations {
                father: Some("B".into()),
                ..Relations::default()
            }),
        ])
        .expect("store");
        let err = chain.delete_person(&"B".into()).unwrap_err();
        assert!(matches!(err, StoreError::WouldDisconnect(_)));
    }

    #[test]
    fn deleting_last_person_leaves_an_empty_one() {
        let mut store = RelationStore::from_persons(vec![Person::new("only")]).expect("store");
        store.delete_person(&"only".into()).expect("delete");
        assert_eq!(store.len(), 1);
        assert_ne!(store.persons()[0].id, PersonId::from("only"));
    }

    #[test]
    fn toggle_flips_sign_with_increasing_sequence() {
        let mut state = DuplicateToggleState::default();
        let key = ToggleKey::new("a".into(), BranchParent::Main, Some("b".into()));
        assert_eq!(state.toggle(&key), None);
        assert_eq!(state.get_or_init(&key, -1), -1);
        let first = state.toggle(&key).expect("toggle");
        assert!(first > 0);
        let second = state.toggle(&key).expect("toggle");
        assert!(second < 0 && second.abs() > first);
        state.stash(&key);
        assert_eq!(state.get(&key), None);
        assert_eq!(state.get_or_init(&key, 1), second);
    }

    #[test]
    fn add_child_with_new_other_parent() {
        let mut store =
            RelationStore::from_persons(vec![Person::new("F").with_gender(Gender::Male)])
                .expect("store");
        let child = Person::new("K").with_gender(Gender::Female);
        store
            .add_relative(&"F".into(), RelType::Daughter, child, Some(OtherParent::New))
            .expect("add");
        let k = store.get(&"K".into()).expect("child");
        assert_eq!(k.rels.father, Some("F".into()));
        let mother = k.rels.mother.clone().expect("mother");
        let m = store.get(&mother).expect("mother exists");
        assert_eq!(m.gender(), Some(Gender::Female));
        assert_eq!(m.rels.spouses, vec![PersonId::from("F")]);
        assert!(m.rels.children.contains(&"K".into()));
    }

    #[test]
    fn add_parent_links_existing_other_parent() {
        let mut store = RelationStore::from_persons(vec![
            person("C", Gender::Male, Relations {
                mother: Some("Mo".into()),
                ..Relations::default()
            }),
            person("Mo", Gender::Female, Relations {
                children: vec!["C".into()],
                ..Relations::default()
            }),
        ])
        .expect("store");
        let father = Person::new("Fa").with_gender(Gender::Male);
        store
            .add_relative(&"C".into(), RelType::Father, father, None)
            .expect("add");
        assert_eq!(
            store.get(&"Fa".into()).map(|p| p.rels.spouses.clone()),
            Some(vec!["Mo".into()])
        );
        assert!(
            store
                .get(&"Mo".into())
                .is_some_and(|p| p.rels.spouses.contains(&"Fa".into()))
        );

        let second = Person::new("Fb").with_gender(Gender::Male);
        let err = store
            .add_relative(&"C".into(), RelType::Father, second, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ParentSlotTaken { .. }));
    }

    #[test]
    fn link_existing_moves_references() {
        let mut store = couple_with_child();
        let spouse = Person::new("tmp").with_gender(Gender::Female);
        store
            .add_relative(&"C".into(), RelType::Spouse, spouse, None)
            .expect("add");
        store
            .add_person(Person::new("W").with_gender(Gender::Female))
            .expect("add");
        store
            .link_existing_relative(&"tmp".into(), &"W".into())
            .expect("link");
        assert!(!store.contains(&"tmp".into()));
        let spouses = |store: &RelationStore, id: &str| {
            store.get(&id.into()).map(|p| p.rels.spouses.clone())
        };
        assert_eq!(spouses(&store, "C"), Some(vec!["W".into()]));
        assert_eq!(spouses(&store, "W"), Some(vec!["C".into()]));
    }

    #[test]
    fn link_options_exclude_lineage() {
        let mut store = couple_with_child();
        store.add_person(Person::new("X")).expect("add");
        let options = store.link_options(&"C".into());
        assert_eq!(options, vec![PersonId::from("X")]);
    }

    #[test]
    fn add_relative_mode_rolls_back_exactly() {
        let mut store = couple_with_child();
        let before: Vec<Person> = store.persons().to_vec();
        store
            .start_add_relative(&"C".into(), &AddRelativeLabels::default())
            .expect("start");
        assert!(store.edit_in_progress());
        // one new spouse plus a son and a daughter for it
        assert_eq!(store.len(), before.len() + 3);
        assert_eq!(store.get(&"C".into()).map(|p| p.rels.children.len()), Some(2));
        store.rollback_edit().expect("rollback");
        assert_eq!(store.persons(), &before[..]);
    }

    #[test]
    fn add_relative_mode_commit_keeps_confirmed() {
        let mut store = couple_with_child();
        store
            .start_add_relative(&"C".into(), &AddRelativeLabels::default())
            .expect("start");
        let son = store
            .persons()
            .iter()
            .find(|p| p.new_relative.as_ref().is_some_and(|nr| nr.rel_type == RelType::Son))
            .map(|p| p.id.clone())
            .expect("son placeholder");
        store.confirm_new_relative(&son).expect("confirm");
        store.commit_edit().expect("commit");
        assert!(store.persons().iter().all(|p| p.new_relative.is_none()));
        let c = store.get(&"C".into()).expect("C");
        assert!(c.rels.children.contains(&son));
        assert_eq!(c.rels.father, Some("M".into()));
        // M got its own children back merged
        let m = store.get(&"M".into()).expect("M");
        assert_eq!(m.rels.spouses, vec![PersonId::from("S")]);
    }

    #[test]
    fn main_history_falls_back_after_delete() {
        let mut store = couple_with_child();
        store.update_main_id("S".into());
        store.update_main_id("C".into());
        store.delete_person(&"C".into()).expect("delete");
        assert_eq!(store.last_available_main(), Some("S".into()));
    }
}
