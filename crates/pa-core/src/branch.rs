//! Branch divergence analysis.
//!
//! For one gateway and one target node, counts how many instances took each
//! outgoing branch and how many of those went on to reach the target.

use std::collections::{BTreeMap, HashSet};

use pa_common::{
    BranchAnalysisResult, BranchOutcome, DefinitionScope, DefinitionType, ExternalFilter, Result,
};
use pa_config::ScrollConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::{AnalysisServices, RequestContext};
use crate::definition::ProcessGraphResolver;
use crate::graph::{is_reachable, merge_points, NodeIndex, ProcessGraph, VisitedSet};
use crate::log_event;
use crate::logging::{event_names, Stage};
use crate::query::{InstanceQuery, InstanceQueryEngine};

/// Input of a branch analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BranchAnalysisRequest {
    #[serde(default)]
    pub definition_type: DefinitionType,
    pub scope: DefinitionScope,
    /// Id of the splitting gateway.
    pub gateway: String,
    /// Id of the node whose reach is measured.
    pub end_event: String,
    #[serde(default)]
    pub filters: Vec<ExternalFilter>,
}

pub struct BranchAnalyzer<'a> {
    services: AnalysisServices<'a>,
    scroll: ScrollConfig,
}

impl<'a> BranchAnalyzer<'a> {
    pub fn new(services: AnalysisServices<'a>, scroll: ScrollConfig) -> Self {
        Self { services, scroll }
    }

    /// Run the analysis.
    ///
    /// Access is checked before anything else. A scope without a process
    /// definition yields [`BranchAnalysisResult::empty`]; gateway or target
    /// ids missing from an existing graph are `UnknownFlowNode`.
    pub fn analyze(
        &self,
        ctx: &RequestContext,
        request: &BranchAnalysisRequest,
    ) -> Result<BranchAnalysisResult> {
        self.services.authorize(ctx, &request.scope)?;
        log_event!(
            ctx.log,
            INFO,
            event_names::ANALYSIS_STARTED,
            Stage::Branch,
            "branch analysis started",
            gateway = request.gateway.as_str(),
            end_event = request.end_event.as_str()
        );

        let resolver = ProcessGraphResolver::new(self.services.definitions, request.definition_type);
        let Some(graph) = resolver.resolve(&request.scope)? else {
            log_event!(
                ctx.log,
                INFO,
                event_names::GRAPH_MISSING,
                Stage::Resolve,
                "no process definition, returning empty result",
                definition_key = request.scope.key.as_str()
            );
            return Ok(BranchAnalysisResult::empty(
                &request.gateway,
                &request.end_event,
            ));
        };
        log_event!(
            ctx.log,
            DEBUG,
            event_names::GRAPH_RESOLVED,
            Stage::Resolve,
            "process graph resolved",
            nodes = graph.len()
        );

        let gateway = graph.require(&request.gateway)?;
        let target = graph.require(&request.end_event)?;
        let merges = merge_points(&graph);
        let mut visited = VisitedSet::for_graph(&graph);
        let target_reachable = is_reachable(&graph, gateway, target, &mut visited);
        log_event!(
            ctx.log,
            DEBUG,
            event_names::BRANCH_COUNTED,
            Stage::Reachability,
            "gateway reachability",
            reachable = target_reachable
        );

        let engine = InstanceQueryEngine::new(
            self.services.store,
            request.definition_type,
            self.scroll.clone(),
            &ctx.log,
        );
        let base = InstanceQuery::new(request.scope.clone()).with_external(&request.filters);
        let total = engine.count(&base.clone().containing([request.end_event.as_str()]))?;

        let outgoing = outgoing_nodes(&graph, gateway);
        let mut distribution = BTreeMap::new();
        for &current in &outgoing {
            let activity_id = graph.node(current).id.clone();
            let excluded = exclusion_set(&graph, &outgoing, current, target, &merges);
            let branch = base
                .clone()
                .containing([request.gateway.as_str(), activity_id.as_str()])
                .excluding(excluded);

            let activity_count = engine.count(&branch)?;
            let activities_reached = if target_reachable {
                engine.count(&branch.containing([request.end_event.as_str()]))?
            } else {
                0
            };
            log_event!(
                ctx.log,
                DEBUG,
                event_names::BRANCH_COUNTED,
                Stage::Branch,
                "branch counted",
                activity_id = activity_id.as_str(),
                activity_count = activity_count,
                activities_reached = activities_reached
            );
            distribution.insert(
                activity_id.clone(),
                BranchOutcome {
                    activity_id,
                    activity_count,
                    activities_reached,
                },
            );
        }

        log_event!(
            ctx.log,
            INFO,
            event_names::ANALYSIS_FINISHED,
            Stage::Branch,
            "branch analysis finished",
            total = total,
            branches = distribution.len()
        );
        Ok(BranchAnalysisResult {
            gateway: request.gateway.clone(),
            end_event: request.end_event.clone(),
            total,
            follow_node_distribution: distribution,
        })
    }
}

/// Distinct successors of the gateway, in flow order.
fn outgoing_nodes(graph: &ProcessGraph, gateway: NodeIndex) -> Vec<NodeIndex> {
    let mut seen = HashSet::new();
    graph
        .successors(gateway)
        .into_iter()
        .filter(|idx| seen.insert(*idx))
        .collect()
}

/// Sibling branches an instance must not have visited to count for `current`.
///
/// Merge points stay allowed since reconverging paths legitimately pass
/// through them; `current` and the target are never excluded.
fn exclusion_set(
    graph: &ProcessGraph,
    outgoing: &[NodeIndex],
    current: NodeIndex,
    target: NodeIndex,
    merges: &HashSet<&str>,
) -> Vec<String> {
    outgoing
        .iter()
        .filter(|&&idx| idx != current && idx != target)
        .map(|&idx| graph.node(idx).id.as_str())
        .filter(|id| !merges.contains(id))
        .map(str::to_string)
        .collect()
}
