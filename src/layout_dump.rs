use crate::layout::{LinkEnd, LinkKind, NodeIdx, NodeKind, TreeLayout};
use crate::store::BranchParent;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub main_id: String,
    pub is_horizontal: bool,
    pub dim: DimensionsDump,
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
    pub diagnostics: Vec<DiagnosticDump>,
}

#[derive(Debug, Serialize)]
pub struct DimensionsDump {
    pub width: f64,
    pub height: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub tid: String,
    pub id: String,
    pub kind: &'static str,
    pub x: f64,
    pub y: f64,
    pub depth: usize,
    pub is_ancestry: bool,
    pub is_main: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spouses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psy: Option<f64>,
    pub from: Vec<String>,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<usize>,
    pub all_relatives_displayed: bool,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle: Option<ToggleDump>,
}

#[derive(Debug, Serialize)]
pub struct ToggleDump {
    pub group_id: u32,
    pub owner_id: String,
    /// `None` when the branch hangs from the focal person.
    pub branching_parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    pub priority: i64,
    pub expanded: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub id: String,
    pub kind: &'static str,
    pub points: Vec<[f64; 2]>,
    pub collapsed: Vec<[f64; 2]>,
    pub curve: bool,
    pub depth: usize,
    pub is_ancestry: bool,
    pub source: Vec<String>,
    pub target: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticDump {
    pub kind: &'static str,
    pub message: String,
}

impl LayoutDump {
    pub fn from_layout(layout: &TreeLayout) -> Self {
        let tid = |idx: NodeIdx| layout.node(idx).tid.clone();
        let tids = |nodes: &[NodeIdx]| nodes.iter().map(|n| tid(*n)).collect::<Vec<_>>();
        let end = |end: &LinkEnd| tids(end.nodes());

        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                tid: node.tid.clone(),
                id: node.person.to_string(),
                kind: match node.kind {
                    NodeKind::Blood => "blood",
                    NodeKind::Spouse { .. } => "spouse",
                    NodeKind::Placeholder { .. } => "placeholder",
                    NodeKind::Sibling { .. } => "sibling",
                },
                x: node.x,
                y: node.y,
                depth: node.depth,
                is_ancestry: node.is_ancestry,
                is_main: node.is_main,
                parent: node.parent.map(tid),
                spouses: tids(&node.spouses),
                sx: node.sx,
                sy: node.sy,
                psx: node.psx,
                psy: node.psy,
                from: tids(&node.from),
                to: tids(&node.to),
                duplicate_count: node.duplicate_count,
                all_relatives_displayed: node.all_relatives_displayed,
                is_private: node.is_private,
                toggle: node.toggle.as_ref().map(|t| ToggleDump {
                    group_id: t.group_id,
                    owner_id: t.key.owner.to_string(),
                    branching_parent_id: match &t.key.branch {
                        BranchParent::Main => None,
                        BranchParent::Person(id) => Some(id.to_string()),
                    },
                    partner_id: t.key.partner.as_ref().map(ToString::to_string),
                    priority: t.priority,
                    expanded: t.expanded,
                }),
            })
            .collect();

        let links = layout
            .links
            .iter()
            .map(|link| LinkDump {
                id: link.id.clone(),
                kind: match link.kind {
                    LinkKind::Spouse => "spouse",
                    LinkKind::Ancestry => "ancestry",
                    LinkKind::Progeny => "progeny",
                },
                points: link.points.iter().map(|(x, y)| [*x, *y]).collect(),
                collapsed: link.collapsed.iter().map(|(x, y)| [*x, *y]).collect(),
                curve: link.curve,
                depth: link.depth,
                is_ancestry: link.is_ancestry,
                source: end(&link.source),
                target: end(&link.target),
            })
            .collect();

        let diagnostics = layout
            .diagnostics
            .iter()
            .map(|d| DiagnosticDump {
                kind: d.kind(),
                message: d.to_string(),
            })
            .collect();

        LayoutDump {
            main_id: layout.main_id.to_string(),
            is_horizontal: layout.is_horizontal,
            dim: DimensionsDump {
                width: layout.dim.width,
                height: layout.dim.height,
                x_offset: layout.dim.x_offset,
                y_offset: layout.dim.y_offset,
            },
            nodes,
            links,
            diagnostics,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout when no path is given.
pub fn write_layout_dump(path: Option<&Path>, layout: &TreeLayout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
