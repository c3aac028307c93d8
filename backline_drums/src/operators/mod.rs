// The operator library: 28 independent pattern-generating units in 5
// families. Each operator answers whether it applies to this bar, what hits
// it would propose, and how good each proposal is, and nothing else.
// Operators never touch memory or the style tables directly;
// everything they may consider is in the `DrummerContext`.
//
// Determinism: an operator that randomizes draws from a stream keyed by
// (role, bar, operator id), so identical (context, seed) always reproduce
// identical candidates, and inserting a new operator cannot shift the draws
// of existing ones.
//
// Families:
// - micro.rs: ghost/pickup embellishments (7)
// - subdivision.rs: hat/ride grid changes (5)
// - phrase.rs: crashes, fills, setups, stop-time (7)
// - pattern.rs: whole-pattern swaps on disjoint energy bands (4)
// - idiom.rs: style-gated signature patterns (5)

pub mod idiom;
pub mod micro;
pub mod pattern;
pub mod phrase;
pub mod subdivision;

use crate::candidate::DrumCandidate;
use crate::context::DrummerContext;
use backline_prng::DrumRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of operator families, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorFamily {
    MicroAddition,
    SubdivisionTransform,
    PhrasePunctuation,
    PatternSubstitution,
    StyleIdiom,
}

impl OperatorFamily {
    pub const ALL: [OperatorFamily; 5] = [
        OperatorFamily::MicroAddition,
        OperatorFamily::SubdivisionTransform,
        OperatorFamily::PhrasePunctuation,
        OperatorFamily::PatternSubstitution,
        OperatorFamily::StyleIdiom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperatorFamily::MicroAddition => "MicroAddition",
            OperatorFamily::SubdivisionTransform => "SubdivisionTransform",
            OperatorFamily::PhrasePunctuation => "PhrasePunctuation",
            OperatorFamily::PatternSubstitution => "PatternSubstitution",
            OperatorFamily::StyleIdiom => "StyleIdiom",
        }
    }
}

impl fmt::Display for OperatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime failure inside one operator, with whatever it produced before
/// failing. The candidate source decides whether to capture or propagate.
#[derive(Debug, Clone)]
pub struct OperatorError {
    pub operator: String,
    pub message: String,
    pub partial: Vec<DrumCandidate>,
}

/// A pattern-generating unit.
///
/// `generate` yields an empty list for inapplicable contexts; it only errors
/// on genuine runtime failures. `score` maps a candidate to [0, 1] under the
/// given context.
pub trait DrumOperator {
    /// Unique, stable identifier (also the candidate id prefix).
    fn id(&self) -> &'static str;
    fn family(&self) -> OperatorFamily;
    fn can_apply(&self, ctx: &DrummerContext) -> bool;
    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError>;
    fn score(&self, candidate: &DrumCandidate, ctx: &DrummerContext) -> f64;
}

/// Deterministic stream for one operator's pass over one (role, bar).
pub(crate) fn op_stream(ctx: &DrummerContext, operator: &str) -> DrumRng {
    DrumRng::for_stream(ctx.seed, &format!("{}:{}", ctx.rng_stream_key, operator))
}

pub(crate) fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Quarter-note offbeat positions of a bar (1.5, 2.5, ...).
pub(crate) fn offbeats(beats_per_bar: u8) -> Vec<f64> {
    (1..=beats_per_bar).map(|b| f64::from(b) + 0.5).collect()
}

/// Integer beat positions of a bar (1.0, 2.0, ...).
pub(crate) fn quarter_beats(beats_per_bar: u8) -> Vec<f64> {
    (1..=beats_per_bar).map(f64::from).collect()
}

/// Context factory shared by the per-family operator tests.
#[cfg(test)]
pub(crate) mod testutil {
    use crate::candidate::Role;
    use crate::context::{
        build_context, BarInfo, ContextInput, ContextOverrides, DrummerContext, FillPolicy,
        SectionInfo,
    };
    use crate::style::{HatMode, SectionType, Subdivision};

    pub struct CtxSpec {
        pub bar: u32,
        pub start_bar: u32,
        pub length_bars: u32,
        pub section: SectionType,
        pub energy: f64,
        pub tension: f64,
        pub style: &'static str,
        pub fill_window_bars: Option<u32>,
        pub hat: Option<(HatMode, Subdivision)>,
        pub role: Role,
    }

    impl Default for CtxSpec {
        fn default() -> Self {
            CtxSpec {
                bar: 6,
                start_bar: 5,
                length_bars: 4,
                section: SectionType::Verse,
                energy: 0.5,
                tension: 0.3,
                style: "rock",
                fill_window_bars: None,
                hat: None,
                role: Role::Snare,
            }
        }
    }

    pub fn ctx(spec: CtxSpec) -> DrummerContext {
        build_context(&ContextInput {
            bar: BarInfo {
                bar: spec.bar,
                beats_per_bar: 4,
                energy: spec.energy,
                tension: spec.tension,
                motif_presence: 0.0,
            },
            section: SectionInfo {
                section: spec.section,
                start_bar: spec.start_bar,
                length_bars: spec.length_bars,
            },
            fill_policy: spec.fill_window_bars.map(|window_bars| FillPolicy { window_bars }),
            role: spec.role,
            style: spec.style.to_string(),
            seed: 99,
            overrides: spec.hat.map(|(mode, sub)| ContextOverrides {
                hat_mode: Some(mode),
                hat_subdivision: Some(sub),
                ..ContextOverrides::default()
            }),
        })
    }

    /// A context that is in the final bar of its section with the fill
    /// window open.
    pub fn fill_ctx(energy: f64, tension: f64) -> DrummerContext {
        ctx(CtxSpec {
            bar: 8,
            energy,
            tension,
            fill_window_bars: Some(1),
            ..CtxSpec::default()
        })
    }
}
