//! Output formats and one-line summaries of analysis results.

use std::collections::BTreeMap;

use clap::ValueEnum;
use pa_common::{BranchAnalysisResult, DurationChartEntry, FindingsDto, VariableTermDto};
use serde::{Deserialize, Serialize};

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON envelope (default)
    #[default]
    Json,

    /// Short human-readable lines
    Summary,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}

pub fn summarize_branches(result: &BranchAnalysisResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{} -> {}: {} instances reached the target",
        result.gateway, result.end_event, result.total
    )];
    lines.extend(result.follow_node_distribution.values().map(|outcome| {
        format!(
            "  {}: {} took the branch, {} reached",
            outcome.activity_id, outcome.activity_count, outcome.activities_reached
        )
    }));
    lines
}

pub fn summarize_findings(findings: &BTreeMap<String, FindingsDto>) -> Vec<String> {
    if findings.is_empty() {
        return vec!["no outliers found".to_string()];
    }
    let mut ranked: Vec<(&String, &FindingsDto)> = findings.iter().collect();
    ranked.sort_by(|a, b| b.1.heat.total_cmp(&a.1.heat).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .map(|(id, dto)| {
            format!(
                "{id}: heat {:.2}, {} lower / {} higher of {}",
                dto.heat,
                dto.lower_count(),
                dto.higher_count(),
                dto.total_count
            )
        })
        .collect()
}

pub fn summarize_chart(entries: &[DurationChartEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{:>10}ms {:>6}{}",
                entry.key,
                entry.value,
                if entry.outlier { " *" } else { "" }
            )
        })
        .collect()
}

pub fn summarize_terms(terms: &[VariableTermDto]) -> Vec<String> {
    if terms.is_empty() {
        return vec!["no significant variable terms".to_string()];
    }
    terms
        .iter()
        .map(|term| {
            format!(
                "{}={}: {} outlier instances ({:.1}% vs {:.1}%)",
                term.variable_name,
                term.variable_term,
                term.instance_count,
                term.outlier_ratio * 100.0,
                term.non_outlier_ratio * 100.0
            )
        })
        .collect()
}
