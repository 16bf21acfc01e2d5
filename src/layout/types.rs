use crate::person::PersonId;
use crate::store::ToggleKey;

use super::Diagnostic;

pub type Point = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// On the focal person's blood line: the focal person, ancestors and descendants.
    Blood,
    /// Spouse placed next to the blood-line node `of`.
    Spouse { of: NodeIdx },
    /// Synthetic spouse placed next to `of`.
    Placeholder { of: NodeIdx },
    Sibling { parents: Vec<NodeIdx> },
}

impl NodeKind {
    pub fn spouse_of(&self) -> Option<NodeIdx> {
        match self {
            Self::Spouse { of } | Self::Placeholder { of } => Some(*of),
            Self::Blood | Self::Sibling { .. } => None,
        }
    }

    pub fn is_sibling(&self) -> bool {
        matches!(self, Self::Sibling { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateToggle {
    pub group_id: u32,
    pub key: ToggleKey,
    pub priority: i64,
    pub expanded: bool,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub person: PersonId,
    pub tid: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub depth: usize,
    pub is_ancestry: bool,
    pub is_main: bool,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub parents: Vec<NodeIdx>,
    pub spouses: Vec<NodeIdx>,
    /// Other parent of the same child on the ancestry side.
    pub pair_partner: Option<NodeIdx>,
    pub sx: Option<f64>,
    pub sy: Option<f64>,
    pub psx: Option<f64>,
    pub psy: Option<f64>,
    pub duplicate_count: Option<usize>,
    pub all_relatives_displayed: bool,
    pub is_private: bool,
    pub toggle: Option<DuplicateToggle>,
    pub from: Vec<NodeIdx>,
    pub to: Vec<NodeIdx>,
}

impl TreeNode {
    pub(crate) fn new(person: PersonId, kind: NodeKind) -> Self {
        Self {
            person,
            tid: String::new(),
            kind,
            x: 0.0,
            y: 0.0,
            depth: 0,
            is_ancestry: false,
            is_main: false,
            parent: None,
            children: Vec::new(),
            parents: Vec::new(),
            spouses: Vec::new(),
            pair_partner: None,
            sx: None,
            sy: None,
            psx: None,
            psy: None,
            duplicate_count: None,
            all_relatives_displayed: false,
            is_private: false,
            toggle: None,
            from: Vec::new(),
            to: Vec::new(),
        }
    }

    pub fn position(&self) -> Point {
        (self.x, self.y)
    }

    /// Ancestry parents, or the shared parents of a sibling of the focal person.
    pub fn linked_parents(&self) -> &[NodeIdx] {
        match &self.kind {
            NodeKind::Sibling { parents } => parents,
            _ => &self.parents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Spouse,
    Ancestry,
    Progeny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEnd {
    Single(NodeIdx),
    Couple([NodeIdx; 2]),
}

impl LinkEnd {
    pub fn contains(&self, idx: NodeIdx) -> bool {
        match self {
            Self::Single(node) => *node == idx,
            Self::Couple(pair) => pair.contains(&idx),
        }
    }

    pub fn first(&self) -> NodeIdx {
        match self {
            Self::Single(node) => *node,
            Self::Couple(pair) => pair[0],
        }
    }

    pub fn nodes(&self) -> &[NodeIdx] {
        match self {
            Self::Single(node) => std::slice::from_ref(node),
            Self::Couple(pair) => pair,
        }
    }

    pub(crate) fn pair(a: NodeIdx, b: NodeIdx) -> Self {
        if a == b {
            Self::Single(a)
        } else {
            Self::Couple([a, b])
        }
    }
}

#[derive(Debug, Clone)]
pub struct Link {
    pub id: String,
    pub kind: LinkKind,
    pub points: Vec<Point>,
    /// Path collapsed onto the surviving endpoint, for enter/exit handoff.
    pub collapsed: Vec<Point>,
    pub curve: bool,
    pub depth: usize,
    pub is_ancestry: bool,
    pub source: LinkEnd,
    pub target: LinkEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Scale plus translation, applied as `scale(k) translate(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathToMain {
    pub nodes: Vec<NodeIdx>,
    pub links: Vec<usize>,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct TreeLayout {
    pub nodes: Vec<TreeNode>,
    pub links: Vec<Link>,
    pub dim: Dimensions,
    pub main_id: PersonId,
    pub is_horizontal: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl TreeLayout {
    pub fn node(&self, idx: NodeIdx) -> &TreeNode {
        &self.nodes[idx.0]
    }

    pub fn main(&self) -> NodeIdx {
        NodeIdx(0)
    }

    pub fn find_by_tid(&self, tid: &str) -> Option<NodeIdx> {
        self.nodes.iter().position(|n| n.tid == tid).map(NodeIdx)
    }

    /// Every node showing `person`, in tree order.
    pub fn nodes_of<'a>(&'a self, person: &'a PersonId) -> impl Iterator<Item = NodeIdx> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.person == *person)
            .map(|(idx, _)| NodeIdx(idx))
    }

    pub fn enter_position(&self, idx: NodeIdx) -> Point {
        super::links::enter_position(&self.nodes, idx)
    }

    pub fn exit_position(&self, idx: NodeIdx) -> Point {
        super::links::exit_position(self.node(idx))
    }

    pub fn path_to_main(&self, idx: NodeIdx) -> PathToMain {
        super::path::path_to_main(self, idx)
    }
}
