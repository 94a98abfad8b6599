//! Flow graphs of a pipeline's stages

use serde::Serialize;
use std::fmt::Write;

use crate::pipeline::SequentialPipeline;

/// A stage in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub name: String,
    pub summary: String,
}

/// Data flowing from one stage to the next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    /// State key published by `from`, if it publishes one
    pub label: Option<String>,
}

/// Directed graph of a pipeline, renderable as DOT or Mermaid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowGraph {
    pub name: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn from_pipeline(pipeline: &SequentialPipeline) -> Self {
        let nodes: Vec<FlowNode> = pipeline
            .units()
            .iter()
            .enumerate()
            .map(|(i, unit)| FlowNode {
                id: format!("n{i}"),
                name: unit.name().to_string(),
                summary: unit.spec().summary().to_string(),
            })
            .collect();

        let edges = pipeline
            .units()
            .windows(2)
            .zip(nodes.windows(2))
            .map(|(units, pair)| FlowEdge {
                from: pair[0].id.clone(),
                to: pair[1].id.clone(),
                label: units[0].spec().output_key.clone(),
            })
            .collect();

        Self {
            name: pipeline.name().to_string(),
            nodes,
            edges,
        }
    }

    /// Graphviz DOT source
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", escape(&self.name));
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=rounded];\n");
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    {} [label=\"{}\", tooltip=\"{}\"];",
                node.id,
                escape(&node.name),
                escape(&node.summary)
            );
        }
        for edge in &self.edges {
            match &edge.label {
                Some(label) => {
                    let _ = writeln!(out, "    {} -> {} [label=\"{}\"];", edge.from, edge.to, escape(label));
                }
                None => {
                    let _ = writeln!(out, "    {} -> {};", edge.from, edge.to);
                }
            }
        }
        out.push_str("}\n");
        out
    }

    /// Mermaid flowchart source
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart LR\n");
        for node in &self.nodes {
            let _ = writeln!(out, "    {}[\"{}\"]", node.id, node.name.replace('"', "#quot;"));
        }
        for edge in &self.edges {
            match &edge.label {
                Some(label) => {
                    let _ = writeln!(out, "    {} -->|{}| {}", edge.from, label, edge.to);
                }
                None => {
                    let _ = writeln!(out, "    {} --> {}", edge.from, edge.to);
                }
            }
        }
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
