// Candidate source: one harvesting pass per (bar, role).
//
// Runs every enabled operator against the context, scores and validates the
// output, maps it into engine-facing onsets, optionally prunes the merged
// set through the physicality filter, and files the survivors into
// per-family groups. Everything observed along the way lands in a fresh
// `SourceDiagnostics`; diagnostics are a record, never control flow.

use crate::candidate::{
    operator_tag, trace_tag, ArticulationHint, DrumCandidate, FillRole, OnsetCandidate,
    Role, PROTECTED_TAG,
};
use crate::context::DrummerContext;
use crate::error::GrooveError;
use crate::memory::{AgentMemory, MemorySnapshot};
use crate::operators::{DrumOperator, OperatorFamily};
use crate::physicality::{PhysicalityFilter, Violation};
use crate::policy::PolicyDecision;
use crate::registry::OperatorRegistry;
use crate::style::StyleConfiguration;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// What one operator did during a harvesting pass.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorReport {
    pub operator: String,
    pub family: OperatorFamily,
    pub applicable: bool,
    pub candidates: usize,
    pub mean_score: f64,
    pub error: Option<String>,
    /// Ids the operator emitted before failing.
    pub partial_ids: Vec<String>,
}

/// Serializable record of one `candidate_groups` call.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDiagnostics {
    pub bar: u32,
    pub role: Role,
    pub operators: Vec<OperatorReport>,
    pub physicality_violations: Vec<Violation>,
    pub memory: MemorySnapshot,
    /// Policy's density target for this (bar, role), when it set one.
    pub target_density: Option<f64>,
    /// Kept onsets for the context role over the bar's sixteenth slots.
    pub actual_density: f64,
}

#[derive(Debug)]
pub struct CandidateHarvest {
    /// Surviving onsets grouped by family, in first-seen family order.
    pub groups: Vec<(OperatorFamily, Vec<OnsetCandidate>)>,
    pub diagnostics: SourceDiagnostics,
}

pub struct CandidateSource<'a> {
    registry: &'a OperatorRegistry,
    style: &'a StyleConfiguration,
    physicality: Option<PhysicalityFilter>,
    continue_on_error: bool,
}

impl<'a> CandidateSource<'a> {
    pub fn new(registry: &'a OperatorRegistry, style: &'a StyleConfiguration) -> Self {
        CandidateSource {
            registry,
            style,
            physicality: None,
            continue_on_error: true,
        }
    }

    pub fn with_physicality(mut self, filter: PhysicalityFilter) -> Self {
        self.physicality = Some(filter);
        self
    }

    /// When false, the first operator failure aborts the pass.
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn candidate_groups(
        &self,
        ctx: &DrummerContext,
        policy: &PolicyDecision,
        memory: &AgentMemory,
    ) -> Result<CandidateHarvest, GrooveError> {
        let mut reports = Vec::new();
        let mut merged: Vec<(OperatorFamily, OnsetCandidate)> = Vec::new();

        for op in self.registry.enabled_for(self.style) {
            if !op.can_apply(ctx) {
                reports.push(OperatorReport {
                    operator: op.id().to_string(),
                    family: op.family(),
                    applicable: false,
                    candidates: 0,
                    mean_score: 0.0,
                    error: None,
                    partial_ids: Vec::new(),
                });
                continue;
            }

            match self.run_operator(op, ctx) {
                Ok(scored) => {
                    let mean_score = if scored.is_empty() {
                        0.0
                    } else {
                        scored.iter().map(|c| c.score).sum::<f64>() / scored.len() as f64
                    };
                    debug!(
                        operator = op.id(),
                        bar = ctx.bar,
                        candidates = scored.len(),
                        mean_score,
                        "operator pass"
                    );
                    reports.push(OperatorReport {
                        operator: op.id().to_string(),
                        family: op.family(),
                        applicable: true,
                        candidates: scored.len(),
                        mean_score,
                        error: None,
                        partial_ids: Vec::new(),
                    });
                    merged.extend(
                        scored.iter().map(|cand| (op.family(), self.to_onset(cand))),
                    );
                }
                Err((message, partial)) => {
                    if !self.continue_on_error {
                        return Err(GrooveError::OperatorFailed {
                            operator: op.id().to_string(),
                            message,
                        });
                    }
                    debug!(
                        operator = op.id(),
                        bar = ctx.bar,
                        error = %message,
                        partial = partial.len(),
                        "operator failed, continuing"
                    );
                    reports.push(OperatorReport {
                        operator: op.id().to_string(),
                        family: op.family(),
                        applicable: true,
                        candidates: 0,
                        mean_score: 0.0,
                        error: Some(message),
                        partial_ids: partial,
                    });
                }
            }
        }

        let (merged, violations) = match &self.physicality {
            None => (merged, Vec::new()),
            Some(filter) => {
                let all: Vec<OnsetCandidate> =
                    merged.iter().map(|(_, onset)| onset.clone()).collect();
                let outcome = filter.filter(&all, ctx.bar);
                let kept_tags: BTreeSet<&String> = outcome
                    .kept
                    .iter()
                    .flat_map(|onset| onset.tags.iter())
                    .filter(|tag| tag.starts_with("cand:"))
                    .collect();
                let merged = merged
                    .into_iter()
                    .filter(|(_, onset)| {
                        onset
                            .tags
                            .iter()
                            .any(|tag| tag.starts_with("cand:") && kept_tags.contains(tag))
                    })
                    .collect();
                (merged, outcome.violations)
            }
        };

        let role_hits = merged
            .iter()
            .filter(|(_, onset)| onset.role == ctx.role)
            .count();
        let sixteenth_slots = f64::from(ctx.beats_per_bar) * 4.0;
        let actual_density = (role_hits as f64 / sixteenth_slots).min(1.0);

        let mut groups: Vec<(OperatorFamily, Vec<OnsetCandidate>)> = Vec::new();
        for (family, onset) in merged {
            match groups.iter_mut().find(|(f, _)| *f == family) {
                Some((_, group)) => group.push(onset),
                None => groups.push((family, vec![onset])),
            }
        }

        debug!(
            bar = ctx.bar,
            role = %ctx.role,
            groups = groups.len(),
            onsets = groups.iter().map(|(_, g)| g.len()).sum::<usize>(),
            violations = violations.len(),
            "harvest complete"
        );

        Ok(CandidateHarvest {
            groups,
            diagnostics: SourceDiagnostics {
                bar: ctx.bar,
                role: ctx.role,
                operators: reports,
                physicality_violations: violations,
                memory: memory.snapshot(),
                target_density: policy.density,
                actual_density,
            },
        })
    }

    /// Generate, score, and validate one operator's candidates. An invalid
    /// candidate is an operator defect and fails the whole pass for that
    /// operator.
    fn run_operator(
        &self,
        op: &dyn DrumOperator,
        ctx: &DrummerContext,
    ) -> Result<Vec<DrumCandidate>, (String, Vec<String>)> {
        let mut candidates = op
            .generate(ctx)
            .map_err(|e| (e.message, e.partial.iter().map(|c| c.id.clone()).collect()))?;
        for index in 0..candidates.len() {
            candidates[index].score = op.score(&candidates[index], ctx);
            if let Err(message) = candidates[index].validate() {
                let valid_ids = candidates[..index].iter().map(|c| c.id.clone()).collect();
                return Err((
                    format!("invalid candidate '{}': {message}", candidates[index].id),
                    valid_ids,
                ));
            }
        }
        Ok(candidates)
    }

    fn to_onset(&self, cand: &DrumCandidate) -> OnsetCandidate {
        let weight = self.style.weight_for(&cand.operator);
        let mut tags = BTreeSet::new();
        tags.insert(trace_tag(&cand.id));
        tags.insert(operator_tag(&cand.operator));
        // Crashes and fill gestures are structural; the physicality filter
        // may flag them but not drop them.
        let structural = matches!(
            cand.articulation,
            ArticulationHint::Crash | ArticulationHint::CrashChoke
        ) || cand.fill_role != FillRole::None;
        if structural {
            tags.insert(PROTECTED_TAG.to_string());
        }
        OnsetCandidate {
            role: cand.role,
            beat: cand.beat,
            strength: cand.strength,
            velocity_hint: cand.velocity_hint,
            timing_hint: cand.timing_hint,
            articulation: cand.articulation,
            fill_role: cand.fill_role,
            max_adds_per_bar: 1,
            probability_bias: (cand.score * weight).clamp(0.0, 1.0),
            tags,
        }
    }
}
