// Candidate value types: the currency of the whole pipeline.
//
// Operators emit `DrumCandidate`s, one proposed hit each, with a
// deterministically derived id so the same (context, seed) always names the
// same proposals. The candidate source scores them and maps them into the
// engine-facing `OnsetCandidate` form that the external selection engine
// consumes. Both are per-bar snapshots, discarded after selection.
//
// Enum declaration order on `FillRole` is a serialization contract: the
// selection engine sorts fill candidates by it, so reordering variants is a
// breaking change (tested in this file).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Percussion role a candidate targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Role {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Ride,
    Crash,
    HighTom,
    MidTom,
    FloorTom,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Kick,
        Role::Snare,
        Role::ClosedHat,
        Role::OpenHat,
        Role::Ride,
        Role::Crash,
        Role::HighTom,
        Role::MidTom,
        Role::FloorTom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Kick => "Kick",
            Role::Snare => "Snare",
            Role::ClosedHat => "ClosedHat",
            Role::OpenHat => "OpenHat",
            Role::Ride => "Ride",
            Role::Crash => "Crash",
            Role::HighTom => "HighTom",
            Role::MidTom => "MidTom",
            Role::FloorTom => "FloorTom",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric weight of a proposed hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strength {
    Downbeat,
    Backbeat,
    Strong,
    Offbeat,
    Pickup,
    Ghost,
}

/// How the hit should be articulated, if the operator cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArticulationHint {
    None,
    Rimshot,
    SideStick,
    OpenHat,
    Crash,
    Ride,
    RideBell,
    CrashChoke,
    Flam,
}

impl ArticulationHint {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticulationHint::None => "None",
            ArticulationHint::Rimshot => "Rimshot",
            ArticulationHint::SideStick => "SideStick",
            ArticulationHint::OpenHat => "OpenHat",
            ArticulationHint::Crash => "Crash",
            ArticulationHint::Ride => "Ride",
            ArticulationHint::RideBell => "RideBell",
            ArticulationHint::CrashChoke => "CrashChoke",
            ArticulationHint::Flam => "Flam",
        }
    }
}

/// Position of a hit inside a fill gesture.
///
/// Declaration order (None < Setup < FillStart < FillBody < FillEnd) is the
/// stable serialization/sort order. Do not reorder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FillRole {
    None,
    Setup,
    FillStart,
    FillBody,
    FillEnd,
}

/// Render a beat for use in a candidate id: integral beats print without a
/// fractional part ("2"), others minimally ("1.75").
fn format_beat(beat: f64) -> String {
    if beat.fract() == 0.0 {
        format!("{}", beat as i64)
    } else {
        format!("{beat}")
    }
}

/// Derive a candidate id from its identifying coordinates.
///
/// Pure string derivation, no randomness: `Operator_Role_Bar_Beat`, with an
/// articulation suffix appended only when the articulation is not `None`.
/// `candidate_id("GhostBefore", Snare, 4, 1.75, None)` is
/// `"GhostBefore_Snare_4_1.75"`.
pub fn candidate_id(
    operator: &str,
    role: Role,
    bar: u32,
    beat: f64,
    articulation: ArticulationHint,
) -> String {
    let mut id = format!("{operator}_{role}_{bar}_{}", format_beat(beat));
    if articulation != ArticulationHint::None {
        id.push('_');
        id.push_str(articulation.as_str());
    }
    id
}

/// One proposed drum hit, as emitted by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumCandidate {
    /// Deterministically derived id (see `candidate_id`).
    pub id: String,
    /// Id of the operator that proposed this hit.
    pub operator: String,
    pub role: Role,
    /// 1-based bar number.
    pub bar: u32,
    /// 1-based beat position within the bar (rational, quarter-note units).
    pub beat: f64,
    pub strength: Strength,
    /// Suggested MIDI velocity, 0-127.
    pub velocity_hint: Option<u8>,
    /// Suggested timing offset in beats (negative = ahead, positive = behind).
    pub timing_hint: Option<f64>,
    pub articulation: ArticulationHint,
    pub fill_role: FillRole,
    /// Operator-assigned quality in [0, 1]. Filled in by the candidate source.
    pub score: f64,
}

impl DrumCandidate {
    pub fn new(operator: &str, role: Role, bar: u32, beat: f64, strength: Strength) -> Self {
        DrumCandidate {
            id: candidate_id(operator, role, bar, beat, ArticulationHint::None),
            operator: operator.to_string(),
            role,
            bar,
            beat,
            strength,
            velocity_hint: None,
            timing_hint: None,
            articulation: ArticulationHint::None,
            fill_role: FillRole::None,
            score: 0.0,
        }
    }

    pub fn velocity(mut self, velocity: u8) -> Self {
        self.velocity_hint = Some(velocity);
        self
    }

    pub fn timing(mut self, offset: f64) -> Self {
        self.timing_hint = Some(offset);
        self
    }

    /// Set the articulation; the id picks up the articulation suffix.
    pub fn articulation(mut self, articulation: ArticulationHint) -> Self {
        self.articulation = articulation;
        self.id = candidate_id(&self.operator, self.role, self.bar, self.beat, articulation);
        self
    }

    pub fn fill_role(mut self, fill_role: FillRole) -> Self {
        self.fill_role = fill_role;
        self
    }

    /// Check every field, reporting the first invalid one by name.
    ///
    /// Never panics; the caller decides what to do with an invalid candidate.
    pub fn validate(&self) -> Result<(), String> {
        if self.operator.is_empty() {
            return Err("operator: must not be empty".to_string());
        }
        if self.id.is_empty() {
            return Err("id: must not be empty".to_string());
        }
        if self.bar < 1 {
            return Err(format!("bar: must be >= 1 (got {})", self.bar));
        }
        if !self.beat.is_finite() || self.beat < 1.0 {
            return Err(format!("beat: must be a finite value >= 1.0 (got {})", self.beat));
        }
        if let Some(v) = self.velocity_hint {
            if v > 127 {
                return Err(format!("velocity_hint: must be 0-127 (got {v})"));
            }
        }
        if let Some(t) = self.timing_hint {
            if !t.is_finite() {
                return Err(format!("timing_hint: must be finite (got {t})"));
            }
        }
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err(format!("score: must be in [0, 1] (got {})", self.score));
        }
        Ok(())
    }
}

/// Tag marking a candidate the physicality filter may not remove.
pub const PROTECTED_TAG: &str = "protected";

/// Traceability tag carrying the originating candidate id.
pub fn trace_tag(candidate_id: &str) -> String {
    format!("cand:{candidate_id}")
}

/// Tag carrying the originating operator id (used by the selection engine to
/// record operator usage into agent memory).
pub fn operator_tag(operator: &str) -> String {
    format!("op:{operator}")
}

/// Engine-facing onset candidate, produced by mapping a scored
/// `DrumCandidate`. This is what the external selection engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetCandidate {
    pub role: Role,
    /// 1-based onset beat within the bar.
    pub beat: f64,
    pub strength: Strength,
    pub velocity_hint: Option<u8>,
    pub timing_hint: Option<f64>,
    pub articulation: ArticulationHint,
    pub fill_role: FillRole,
    /// How many times the selection engine may add this onset per bar.
    pub max_adds_per_bar: u8,
    /// Selection weighting in [0, 1]: operator score x style operator weight.
    pub probability_bias: f64,
    /// Tag set: always carries a `cand:<id>` and `op:<id>` tag; `protected`
    /// when the candidate is exempt from physicality removal.
    pub tags: BTreeSet<String>,
}

impl OnsetCandidate {
    pub fn is_protected(&self) -> bool {
        self.tags.contains(PROTECTED_TAG)
    }
}
