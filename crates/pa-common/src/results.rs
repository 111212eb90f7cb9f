//! Result types produced by branch and outlier analysis.

use pa_math::ExtendedStats;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts for one node following a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BranchOutcome {
    pub activity_id: String,
    /// Instances that passed through the gateway and this node, after
    /// sibling exclusions.
    pub activity_count: u64,
    /// Subset of `activity_count` that also reached the target node.
    pub activities_reached: u64,
}

/// Branch divergence of one gateway towards one target node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BranchAnalysisResult {
    pub gateway: String,
    pub end_event: String,
    /// Instances that reached the target node, without exclusions.
    pub total: u64,
    /// Outcome per outgoing node of the gateway, keyed by activity id.
    pub follow_node_distribution: BTreeMap<String, BranchOutcome>,
}

impl BranchAnalysisResult {
    /// The all-zero result returned when no process graph is available.
    pub fn empty(gateway: impl Into<String>, end_event: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            end_event: end_event.into(),
            total: 0,
            follow_node_distribution: BTreeMap::new(),
        }
    }
}

/// Duration statistics of one flow node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowNodeStats {
    pub count: u64,
    pub mean: f64,
    pub std_deviation: f64,
    pub min: f64,
    pub max: f64,
}

impl From<&ExtendedStats> for FlowNodeStats {
    fn from(stats: &ExtendedStats) -> Self {
        Self {
            count: stats.count,
            mean: stats.mean(),
            std_deviation: stats.std_deviation(),
            min: stats.min_value().unwrap_or(0.0),
            max: stats.max_value().unwrap_or(0.0),
        }
    }
}

/// Duration thresholds outside of which an execution is an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    /// `mean ± multiplier·σ`.
    pub fn from_stats(stats: &FlowNodeStats, multiplier: f64) -> Self {
        let spread = multiplier * stats.std_deviation;
        Self {
            lower: stats.mean - spread,
            upper: stats.mean + spread,
        }
    }

    pub fn is_outlier(&self, duration: f64) -> bool {
        duration < self.lower || duration > self.upper
    }
}

/// Lower or higher outliers of one flow node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    /// The bound the outliers lie beyond.
    pub bound_value: f64,
    /// Instances beyond the bound.
    pub count: u64,
    /// `count` over the node's execution count.
    pub percentage: f64,
    /// How many times faster (lower) or slower (higher) the outliers are on
    /// average compared to the mean.
    pub relation: f64,
}

/// Outlier findings of one flow node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FindingsDto {
    pub lower_outlier: Option<Finding>,
    pub higher_outlier: Option<Finding>,
    /// Share of all outliers across every analysed node.
    pub heat: f64,
    pub lower_outlier_heat: f64,
    pub higher_outlier_heat: f64,
    /// Executions of the node.
    pub total_count: u64,
}

impl FindingsDto {
    pub fn lower_count(&self) -> u64 {
        self.lower_outlier.map_or(0, |f| f.count)
    }

    pub fn higher_count(&self) -> u64 {
        self.higher_outlier.map_or(0, |f| f.count)
    }

    pub fn outlier_count(&self) -> u64 {
        self.lower_count() + self.higher_count()
    }
}

/// One bucket of the duration histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DurationChartEntry {
    /// Lower edge of the bucket in milliseconds.
    pub key: f64,
    /// Executions in the bucket.
    pub value: u64,
    pub outlier: bool,
}

/// A variable term over-represented among outlier instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VariableTermDto {
    pub variable_name: String,
    pub variable_term: String,
    /// Outlier instances carrying the term.
    pub instance_count: u64,
    pub outlier_ratio: f64,
    pub non_outlier_ratio: f64,
    /// Term occurrences over the combined population.
    pub outlier_to_all_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_from_stats() {
        let mut samples = vec![100.0; 9];
        samples.push(10_000.0);
        let stats = FlowNodeStats::from(&ExtendedStats::from_samples(&samples));
        let bounds = OutlierBounds::from_stats(&stats, 1.0);

        assert!(bounds.lower < stats.mean && stats.mean < bounds.upper);
        assert!(bounds.is_outlier(10_000.0));
        assert!(!bounds.is_outlier(100.0));
        assert!(!bounds.is_outlier(bounds.upper));
    }

    #[test]
    fn empty_stats_convert_to_zeros() {
        let stats = FlowNodeStats::from(&ExtendedStats::default());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);
    }

    #[test]
    fn findings_counts() {
        let finding = Finding {
            bound_value: 4_060.0,
            count: 1,
            percentage: 0.1,
            relation: 9.17,
        };
        let dto = FindingsDto {
            higher_outlier: Some(finding),
            total_count: 10,
            ..FindingsDto::default()
        };
        assert_eq!(dto.lower_count(), 0);
        assert_eq!(dto.outlier_count(), 1);
    }

    #[test]
    fn branch_result_json_shape() {
        let mut result = BranchAnalysisResult::empty("gw", "end");
        result.total = 10;
        result.follow_node_distribution.insert(
            "a".into(),
            BranchOutcome {
                activity_id: "a".into(),
                activity_count: 10,
                activities_reached: 10,
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["follow_node_distribution"]["a"]["activities_reached"], 10);
        assert_eq!(json["end_event"], "end");
    }
}
