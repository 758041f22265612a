//! CFG export to DOT and JSON formats

use crate::cfg::{Cfg, EdgeKind, Vertex, VertexKind};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Export CFG to DOT format for Graphviz
///
/// Nodes are named by vertex id, so minimized graphs keep instruction ids.
pub fn export_dot(cfg: &Cfg) -> String {
    let mut dot = String::from("digraph CFG {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    for vertex in cfg.node_weights() {
        let label = escape_dot_string(&format_vertex(vertex));
        let style = match vertex.kind {
            VertexKind::Branch | VertexKind::Switch => "fillcolor=lightblue, style=filled",
            VertexKind::MutantCarrier => "fillcolor=lightcoral, style=filled",
            VertexKind::Ordinary => "",
        };
        writeln!(dot, "  \"{}\" [label=\"{}\" {}];", vertex.id, label, style).ok();
    }

    dot.push('\n');
    for edge in cfg.edge_references() {
        let kind = edge.weight();
        let label = kind.dot_label();
        let label_attr = if label.is_empty() {
            String::new()
        } else {
            format!(", label=\"{}\"", label)
        };

        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [color={}, style={}{}];",
            cfg[edge.source()].id,
            cfg[edge.target()].id,
            kind.dot_color(),
            match kind {
                EdgeKind::Fallthrough => "dashed",
                EdgeKind::Exception => "dotted",
                _ => "solid",
            },
            label_attr
        )
        .ok();
    }

    dot.push_str("}\n");
    dot
}

fn escape_dot_string(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn format_vertex_kind(kind: VertexKind) -> &'static str {
    match kind {
        VertexKind::Ordinary => "ORDINARY",
        VertexKind::Branch => "BRANCH",
        VertexKind::Switch => "SWITCH",
        VertexKind::MutantCarrier => "MUTANT",
    }
}

fn format_vertex(vertex: &Vertex) -> String {
    let mut label = format!("{}: {}", vertex.id, vertex.label);
    if let Some(id) = vertex.branch_id {
        write!(label, "\\nbranch {}", id).ok();
    }
    if !vertex.mutation_ids.is_empty() {
        let ids: Vec<String> = vertex.mutation_ids.iter().map(|m| m.to_string()).collect();
        write!(label, "\\nmutants {}", ids.join(",")).ok();
    }
    label
}

/// Complete CFG export for JSON serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgExport {
    pub method: String,
    pub entry: Option<usize>,
    pub exits: Vec<usize>,
    pub vertices: Vec<VertexExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexExport {
    pub id: usize,
    pub kind: String,
    pub label: String,
    pub line: Option<u32>,
    pub branch_id: Option<u32>,
    pub case_branch_ids: Vec<(i32, u32)>,
    pub mutation_ids: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    pub from: usize,
    pub to: usize,
    pub kind: String,
}

/// Export CFG to JSON format
pub fn export_json(cfg: &Cfg, method: &str) -> CfgExport {
    use crate::cfg::analysis;

    let entry = analysis::find_entry(cfg).map(|idx| cfg[idx].id);
    let exits = analysis::find_exits(cfg)
        .iter()
        .map(|&idx| cfg[idx].id)
        .collect();

    let vertices = cfg
        .node_weights()
        .map(|v| VertexExport {
            id: v.id,
            kind: format_vertex_kind(v.kind).to_string(),
            label: v.label.clone(),
            line: v.line_number,
            branch_id: v.branch_id,
            case_branch_ids: v.case_branch_ids.clone(),
            mutation_ids: v.mutation_ids.iter().copied().collect(),
        })
        .collect();

    let edges = cfg
        .edge_references()
        .map(|e| EdgeExport {
            from: cfg[e.source()].id,
            to: cfg[e.target()].id,
            kind: format!("{:?}", e.weight()),
        })
        .collect();

    CfgExport {
        method: method.to_string(),
        entry,
        exits,
        vertices,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::DiGraph;

    fn create_test_cfg() -> Cfg {
        let mut g = DiGraph::new();
        let mut branch = Vertex::new(0, "if_icmple 2");
        branch.kind = VertexKind::Branch;
        branch.branch_id = Some(0);
        let b0 = g.add_node(branch);
        let mut carrier = Vertex::new(1, "iadd");
        carrier.kind = VertexKind::MutantCarrier;
        carrier.mutation_ids.insert(5);
        let b1 = g.add_node(carrier);
        let b2 = g.add_node(Vertex::new(2, "return"));

        g.add_edge(b0, b1, EdgeKind::BranchNotTaken);
        g.add_edge(b0, b2, EdgeKind::BranchTaken);
        g.add_edge(b1, b2, EdgeKind::Fallthrough);
        g
    }

    #[test]
    fn test_export_dot() {
        let dot = export_dot(&create_test_cfg());
        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("branch 0"));
        assert!(dot.contains("mutants 5"));
        assert!(dot.contains("\"0\" -> \"2\" [color=green, style=solid, label=\"T\"]"));
        assert!(dot.contains("style=dashed"));
    }

    #[test]
    fn test_export_json() {
        let export = export_json(&create_test_cfg(), "Foo.bar()V");
        assert_eq!(export.entry, Some(0));
        assert_eq!(export.exits, vec![2]);
        assert_eq!(export.vertices.len(), 3);
        assert_eq!(export.vertices[0].kind, "BRANCH");
        assert_eq!(export.vertices[1].mutation_ids, vec![5]);
        assert_eq!(export.edges.len(), 3);
    }

    #[test]
    fn test_export_json_serializes() {
        let export = export_json(&create_test_cfg(), "Foo.bar()V");
        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"method\":\"Foo.bar()V\""));
        assert!(json.contains("\"kind\":\"BranchTaken\""));
    }
}
