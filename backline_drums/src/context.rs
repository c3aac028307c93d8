// Context builder: the per-bar, per-role decision snapshot.
//
// `build_context` is a pure function from (bar/groove info, section info,
// fill policy, energy/tension, overrides) to a `DrummerContext`. Everything
// an operator is allowed to look at lives in the context; operators never
// reach back into the section provider or the style directly. The context
// also names the deterministic RNG stream for this (role, bar) pass, so a
// re-run with the same seed reproduces the same draws no matter what else
// ran in between.

use crate::candidate::Role;
use crate::style::{HatMode, SectionType, Subdivision};
use backline_prng::DrumRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Groove facts about the bar being generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarInfo {
    /// 1-based bar number within the song.
    pub bar: u32,
    pub beats_per_bar: u8,
    /// Energy curve sample in [0, 1] (clamped).
    pub energy: f64,
    /// Tension curve sample in [0, 1] (clamped).
    pub tension: f64,
    /// How much another part's motif occupies this bar, in [0, 1].
    pub motif_presence: f64,
}

/// The section the bar belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInfo {
    pub section: SectionType,
    /// 1-based bar number where the section starts.
    pub start_bar: u32,
    pub length_bars: u32,
}

/// Explicit fill policy. Without one, no bar is ever a fill window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FillPolicy {
    /// The last `window_bars` bars of a section are fill windows.
    pub window_bars: u32,
}

/// Optional per-bar overrides from the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextOverrides {
    pub active_roles: Option<BTreeSet<Role>>,
    pub hat_mode: Option<HatMode>,
    pub hat_subdivision: Option<Subdivision>,
    pub last_kick_beat: Option<f64>,
    pub last_snare_beat: Option<f64>,
}

/// Everything `build_context` needs for one (bar, role) pass.
#[derive(Debug, Clone)]
pub struct ContextInput {
    pub bar: BarInfo,
    pub section: SectionInfo,
    pub fill_policy: Option<FillPolicy>,
    pub role: Role,
    /// Style identifier, gating StyleIdiom operators.
    pub style: String,
    /// Run seed; combined with the stream key for per-pass randomness.
    pub seed: u64,
    pub overrides: Option<ContextOverrides>,
}

/// Immutable decision snapshot handed to operators and the policy provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrummerContext {
    pub bar: u32,
    /// Current beat position; contexts always start at beat 1.
    pub beat: f64,
    pub beats_per_bar: u8,
    pub section: SectionType,
    /// Position within the section in [0, 1]; 0.0 for single-bar sections.
    pub phrase_position: f64,
    pub bars_until_section_end: u32,
    pub energy: f64,
    pub tension: f64,
    pub motif_presence: f64,
    /// Style identifier (StyleIdiom operators gate on this).
    pub style: String,
    /// The role this pass is harvesting for.
    pub role: Role,
    pub seed: u64,
    /// Stable stream key, `"{role}:{bar}"`.
    pub rng_stream_key: String,
    pub active_roles: BTreeSet<Role>,
    pub last_kick_beat: Option<f64>,
    pub last_snare_beat: Option<f64>,
    pub hat_mode: HatMode,
    pub hat_subdivision: Subdivision,
    pub fill_window: bool,
    pub section_boundary: bool,
    /// Backbeat positions for this meter (beat numbers).
    pub backbeats: Vec<u8>,
}

impl DrummerContext {
    /// Fresh deterministic stream for this (role, bar) pass.
    ///
    /// Repeated calls return identical streams, which is what makes repeated
    /// `generate` calls byte-identical for a fixed (context, seed).
    pub fn stream(&self) -> DrumRng {
        DrumRng::for_stream(self.seed, &self.rng_stream_key)
    }

    pub fn is_active(&self, role: Role) -> bool {
        self.active_roles.contains(&role)
    }

    /// True on the first bar of the section.
    pub fn is_section_start(&self) -> bool {
        self.phrase_position == 0.0
    }

    /// True on the last bar of the section.
    pub fn is_section_last_bar(&self) -> bool {
        self.bars_until_section_end == 0
    }
}

/// Backbeat positions by meter. Meters without an entry get none.
pub fn backbeats_for_meter(beats_per_bar: u8) -> Vec<u8> {
    match beats_per_bar {
        2 => vec![2],
        3 => vec![2],
        4 => vec![2, 4],
        5 => vec![3, 5],
        6 => vec![4],
        7 => vec![3, 5, 7],
        _ => Vec::new(),
    }
}

/// Hat mode + subdivision defaults by energy band.
fn hat_defaults(energy: f64) -> (HatMode, Subdivision) {
    if energy < 0.33 {
        (HatMode::Closed, Subdivision::None)
    } else if energy < 0.66 {
        (HatMode::Closed, Subdivision::Eighth)
    } else {
        (HatMode::Ride, Subdivision::Sixteenth)
    }
}

fn default_active_roles() -> BTreeSet<Role> {
    [Role::Kick, Role::Snare, Role::ClosedHat].into_iter().collect()
}

/// Build the decision snapshot for one (bar, role) pass.
///
/// Panics if the bar is outside the section, or bar/section coordinates are
/// not 1-based; those are orchestrator defects, not recoverable conditions.
pub fn build_context(input: &ContextInput) -> DrummerContext {
    let bar = &input.bar;
    let section = &input.section;
    assert!(bar.bar >= 1, "build_context: bar must be >= 1 (got {})", bar.bar);
    assert!(
        bar.beats_per_bar >= 1,
        "build_context: beats_per_bar must be >= 1 (got {})",
        bar.beats_per_bar
    );
    assert!(
        section.start_bar >= 1 && section.length_bars >= 1,
        "build_context: section coordinates must be 1-based and non-empty"
    );
    assert!(
        bar.bar >= section.start_bar && bar.bar < section.start_bar + section.length_bars,
        "build_context: bar {} outside section [{}, {})",
        bar.bar,
        section.start_bar,
        section.start_bar + section.length_bars
    );

    let bar_within = bar.bar - section.start_bar;
    let phrase_position = if section.length_bars == 1 {
        0.0
    } else {
        f64::from(bar_within) / f64::from(section.length_bars - 1)
    };
    let bars_until_section_end = section.length_bars - 1 - bar_within;
    let section_boundary = bar_within == 0 || bars_until_section_end == 0;

    let energy = bar.energy.clamp(0.0, 1.0);
    let tension = bar.tension.clamp(0.0, 1.0);
    let motif_presence = bar.motif_presence.clamp(0.0, 1.0);

    let (default_mode, default_subdivision) = hat_defaults(energy);
    let overrides = input.overrides.clone().unwrap_or_default();
    let hat_mode = overrides.hat_mode.unwrap_or(default_mode);
    let hat_subdivision = overrides.hat_subdivision.unwrap_or(default_subdivision);

    // An override set with no recognized roles falls back to the default.
    let active_roles = match overrides.active_roles {
        Some(roles) if !roles.is_empty() => roles,
        _ => default_active_roles(),
    };

    let fill_window = input
        .fill_policy
        .map(|p| bars_until_section_end < p.window_bars)
        .unwrap_or(false);

    DrummerContext {
        bar: bar.bar,
        beat: 1.0,
        beats_per_bar: bar.beats_per_bar,
        section: section.section,
        phrase_position,
        bars_until_section_end,
        energy,
        tension,
        motif_presence,
        style: input.style.clone(),
        role: input.role,
        seed: input.seed,
        rng_stream_key: format!("{}:{}", input.role, bar.bar),
        active_roles,
        last_kick_beat: overrides.last_kick_beat,
        last_snare_beat: overrides.last_snare_beat,
        hat_mode,
        hat_subdivision,
        fill_window,
        section_boundary,
        backbeats: backbeats_for_meter(bar.beats_per_bar),
    }
}
