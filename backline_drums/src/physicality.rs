// Physicality filter: prunes candidate sets a human drummer could not play.
//
// The filter is advisory pruning, not arbitration: it enforces hit budgets
// and a four-limb model, records every rule breach as a violation, and
// leaves protected candidates in place even when they breach. Evaluation is
// deterministic: candidates are sorted by beat then role before any counter
// is consulted, so input order never changes the outcome.

use crate::candidate::{OnsetCandidate, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Limb {
    RightHand,
    LeftHand,
    RightFoot,
    LeftFoot,
}

impl Limb {
    pub fn is_hand(self) -> bool {
        matches!(self, Limb::RightHand | Limb::LeftHand)
    }
}

/// Sticking tolerance. Scales the allowed same-hand run only; the hit
/// budgets are hard limits at every strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strictness {
    Strict,
    Normal,
    Loose,
}

impl Strictness {
    fn run_slack(self) -> u8 {
        match self {
            Strictness::Strict => 0,
            Strictness::Normal => 1,
            Strictness::Loose => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalityRules {
    pub limb_map: BTreeMap<Role, Limb>,
    pub max_hits_per_bar: usize,
    pub max_hits_per_beat: usize,
    pub role_caps: BTreeMap<Role, usize>,
    /// Consecutive distinct onsets one hand may play before the filter
    /// demands alternation. Widened by `strictness.run_slack()`.
    pub same_hand_run: u8,
    pub strictness: Strictness,
}

impl Default for PhysicalityRules {
    fn default() -> Self {
        // Right-handed kit: right hand rides the cymbals, left hand owns the
        // snare side, right foot on the kick.
        let limb_map = BTreeMap::from([
            (Role::Kick, Limb::RightFoot),
            (Role::Snare, Limb::LeftHand),
            (Role::ClosedHat, Limb::RightHand),
            (Role::OpenHat, Limb::RightHand),
            (Role::Ride, Limb::RightHand),
            (Role::Crash, Limb::RightHand),
            (Role::HighTom, Limb::LeftHand),
            (Role::MidTom, Limb::LeftHand),
            (Role::FloorTom, Limb::RightHand),
        ]);
        PhysicalityRules {
            limb_map,
            max_hits_per_bar: 24,
            max_hits_per_beat: 4,
            role_caps: BTreeMap::new(),
            same_hand_run: 6,
            strictness: Strictness::Normal,
        }
    }
}

/// One rule breach. `removed` is false for protected candidates, which stay
/// in the kept set with the breach on record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub bar: u32,
    pub beat: f64,
    pub role: Role,
    pub rule: String,
    pub removed: bool,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub kept: Vec<OnsetCandidate>,
    pub violations: Vec<Violation>,
}

pub struct PhysicalityFilter {
    rules: PhysicalityRules,
}

const BEAT_EPS: f64 = 1e-9;

impl PhysicalityFilter {
    pub fn new(rules: PhysicalityRules) -> Self {
        PhysicalityFilter { rules }
    }

    pub fn rules(&self) -> &PhysicalityRules {
        &self.rules
    }

    fn limb_of(&self, role: Role) -> Option<Limb> {
        self.rules.limb_map.get(&role).copied()
    }

    /// Evaluate one bar's merged candidate set.
    pub fn filter(&self, candidates: &[OnsetCandidate], bar: u32) -> FilterOutcome {
        let mut ordered: Vec<OnsetCandidate> = candidates.to_vec();
        ordered.sort_by(|a, b| a.beat.total_cmp(&b.beat).then(a.role.cmp(&b.role)));

        let max_run = self.rules.same_hand_run + self.rules.strictness.run_slack();

        let mut kept: Vec<OnsetCandidate> = Vec::new();
        let mut violations = Vec::new();
        let mut role_counts: BTreeMap<Role, usize> = BTreeMap::new();
        // (hand, beat, run length) of the most recent kept hand onset.
        let mut hand_run: Option<(Limb, f64, u8)> = None;

        for cand in ordered {
            let limb = self.limb_of(cand.role);
            let mut breach: Option<String> = None;

            if kept.len() >= self.rules.max_hits_per_bar {
                breach = Some(format!("bar budget {} exhausted", self.rules.max_hits_per_bar));
            }

            if breach.is_none() {
                let at_beat = kept
                    .iter()
                    .filter(|k| (k.beat - cand.beat).abs() < BEAT_EPS)
                    .count();
                if at_beat >= self.rules.max_hits_per_beat {
                    breach = Some(format!(
                        "beat budget {} exhausted at {}",
                        self.rules.max_hits_per_beat, cand.beat
                    ));
                }
            }

            if breach.is_none() {
                if let Some(&cap) = self.rules.role_caps.get(&cand.role) {
                    if role_counts.get(&cand.role).copied().unwrap_or(0) >= cap {
                        breach = Some(format!("role cap {cap} exhausted for {}", cand.role));
                    }
                }
            }

            if breach.is_none() {
                if let Some(limb) = limb {
                    let conflict = kept.iter().any(|k| {
                        (k.beat - cand.beat).abs() < BEAT_EPS
                            && self.limb_of(k.role) == Some(limb)
                    });
                    if conflict {
                        breach = Some(format!("{limb:?} already committed at {}", cand.beat));
                    }
                }
            }

            if breach.is_none() {
                if let (Some(limb), Some((run_hand, run_beat, run_len))) = (limb, hand_run) {
                    if limb.is_hand()
                        && limb == run_hand
                        && (cand.beat - run_beat).abs() >= BEAT_EPS
                        && run_len >= max_run
                    {
                        breach = Some(format!("same-hand run past {max_run} on {limb:?}"));
                    }
                }
            }

            match breach {
                None => {
                    self.track(&cand, limb, &mut role_counts, &mut hand_run);
                    kept.push(cand);
                }
                Some(rule) => {
                    let protected = cand.is_protected();
                    violations.push(Violation {
                        bar,
                        beat: cand.beat,
                        role: cand.role,
                        rule,
                        removed: !protected,
                    });
                    if protected {
                        self.track(&cand, limb, &mut role_counts, &mut hand_run);
                        kept.push(cand);
                    }
                }
            }
        }

        FilterOutcome { kept, violations }
    }

    fn track(
        &self,
        cand: &OnsetCandidate,
        limb: Option<Limb>,
        role_counts: &mut BTreeMap<Role, usize>,
        hand_run: &mut Option<(Limb, f64, u8)>,
    ) {
        *role_counts.entry(cand.role).or_insert(0) += 1;
        if let Some(limb) = limb {
            if limb.is_hand() {
                *hand_run = match *hand_run {
                    Some((hand, beat, len)) if hand == limb => {
                        let len = if (cand.beat - beat).abs() < BEAT_EPS { len } else { len + 1 };
                        Some((limb, cand.beat, len))
                    }
                    _ => Some((limb, cand.beat, 1)),
                };
            }
        }
    }
}

impl Default for PhysicalityFilter {
    fn default() -> Self {
        Self::new(PhysicalityRules::default())
    }
}
