use crate::layout::Diagnostic;
use crate::person::Person;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

pub const DEFAULT_NODE_SEPARATION: f64 = 250.0;
pub const DEFAULT_LEVEL_SEPARATION: f64 = 150.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivateCardsConfig {
    /// Attribute whose truthy value marks a person as private.
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_separation: f64,
    pub level_separation: f64,
    pub single_parent_empty_card: bool,
    pub is_horizontal: bool,
    pub ancestry_depth: Option<usize>,
    pub progeny_depth: Option<usize>,
    pub show_siblings_of_main: bool,
    pub duplicate_branch_toggle: bool,
    pub on_toggle_one_close_others: bool,
    pub sort_children_by: Option<String>,
    pub private_cards: Option<PrivateCardsConfig>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_separation: DEFAULT_NODE_SEPARATION,
            level_separation: DEFAULT_LEVEL_SEPARATION,
            single_parent_empty_card: true,
            is_horizontal: false,
            ancestry_depth: None,
            progeny_depth: None,
            show_siblings_of_main: false,
            duplicate_branch_toggle: false,
            on_toggle_one_close_others: true,
            sort_children_by: None,
            private_cards: None,
        }
    }
}

impl LayoutConfig {
    /// Sanitized copy plus a diagnostic for every value that had to be replaced.
    pub fn validate(&self) -> (LayoutConfig, Vec<Diagnostic>) {
        let mut config = self.clone();
        let mut diagnostics = Vec::new();
        if !(config.node_separation.is_finite() && config.node_separation > 0.0) {
            diagnostics.push(Diagnostic::InvalidSeparation {
                field: "nodeSeparation",
                value: config.node_separation,
                fallback: DEFAULT_NODE_SEPARATION,
            });
            config.node_separation = DEFAULT_NODE_SEPARATION;
        }
        if !(config.level_separation.is_finite() && config.level_separation > 0.0) {
            diagnostics.push(Diagnostic::InvalidSeparation {
                field: "levelSeparation",
                value: config.level_separation,
                fallback: DEFAULT_LEVEL_SEPARATION,
            });
            config.level_separation = DEFAULT_LEVEL_SEPARATION;
        }
        (config, diagnostics)
    }
}

pub type PersonOrder = Box<dyn Fn(&Person, &Person) -> Ordering>;
pub type PersonPredicate = Box<dyn Fn(&Person) -> bool>;

/// Layout callbacks that cannot live in a config file.
#[derive(Default)]
pub struct LayoutHooks {
    pub sort_children: Option<PersonOrder>,
    pub sort_spouses: Option<PersonOrder>,
    pub private_condition: Option<PersonPredicate>,
}

impl std::fmt::Debug for LayoutHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutHooks")
            .field("sort_children", &self.sort_children.is_some())
            .field("sort_spouses", &self.sort_spouses.is_some())
            .field("private_condition", &self.private_condition.is_some())
            .finish()
    }
}

impl LayoutHooks {
    pub fn from_config(config: &LayoutConfig) -> Self {
        let sort_children = config.sort_children_by.clone().map(|key| {
            Box::new(move |a: &Person, b: &Person| compare_attribute(a, b, &key)) as PersonOrder
        });
        let private_condition = config
            .private_cards
            .as_ref()
            .and_then(|cards| cards.attribute.clone())
            .map(|key| Box::new(move |p: &Person| p.data.is_truthy(&key)) as PersonPredicate);
        Self {
            sort_children,
            sort_spouses: None,
            private_condition,
        }
    }

    pub fn with_sort_children(
        mut self,
        order: impl Fn(&Person, &Person) -> Ordering + 'static,
    ) -> Self {
        self.sort_children = Some(Box::new(order));
        self
    }

    pub fn with_sort_spouses(
        mut self,
        order: impl Fn(&Person, &Person) -> Ordering + 'static,
    ) -> Self {
        self.sort_spouses = Some(Box::new(order));
        self
    }

    pub fn with_private_condition(mut self, condition: impl Fn(&Person) -> bool + 'static) -> Self {
        self.private_condition = Some(Box::new(condition));
        self
    }
}

/// Numbers compare numerically, everything else by its string form; missing values sort last.
fn compare_attribute(a: &Person, b: &Person, key: &str) -> Ordering {
    use serde_json::Value;
    match (a.data.get(key), b.data.get(key)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config: LayoutConfig = json5::from_str(&contents)?;
    Ok(config)
}
