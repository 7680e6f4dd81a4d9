use std::path::Path;

use profile_cleaner_trace::{CleanReport, TreeReport};
use serde::Serialize;

/// JSON document printed on stdout with `--json`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub input: String,
    pub output: String,
    pub patterns: &'a [String],
    pub annotate: bool,
    pub nodes_in: usize,
    pub nodes_kept: usize,
    pub annotated: usize,
    pub trees: &'a [TreeReport],
}

impl<'a> RunReport<'a> {
    pub fn new(
        input: &Path,
        output: &Path,
        patterns: &'a [String],
        annotate: bool,
        report: &'a CleanReport,
    ) -> Self {
        Self {
            input: input.display().to_string(),
            output: output.display().to_string(),
            patterns,
            annotate,
            nodes_in: report.nodes_in(),
            nodes_kept: report.nodes_kept(),
            annotated: report.annotated(),
            trees: &report.trees,
        }
    }
}

/// Markdown table for `--summary`.
pub fn render_summary(report: &CleanReport) -> String {
    let mut md = String::new();
    md.push_str("| tree | event | nodes | kept | removed | annotated | bad urls |\n");
    md.push_str("|---:|---:|---:|---:|---:|---:|---:|\n");
    for tree in &report.trees {
        md.push_str(&format!(
            "| `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` |\n",
            tree.tree,
            tree.event_index.map_or("n/a".to_string(), |v| v.to_string()),
            tree.nodes_in,
            tree.nodes_kept,
            tree.nodes_removed(),
            tree.annotated,
            tree.unparsable_urls,
        ));
    }
    md.push_str(&format!(
        "\nTotal: {} nodes, {} kept, {} annotated\n",
        report.nodes_in(),
        report.nodes_kept(),
        report.annotated()
    ));
    md
}
