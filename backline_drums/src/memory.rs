// Agent memory: the rolling record that keeps a drummer from repeating
// itself across a song.
//
// One instance per run (per drum agent). The external selection engine is
// the writer: it records operator usage, fills, crash hits, hat-mode changes
// and ghost counts as decisions finalize. The policy provider and candidate
// source only read. Never shared across runs: each run owns its instance,
// which is what keeps same-seed re-runs reproducible.
//
// Windowed structures evict by bar distance, not entry count: a window of 8
// means "the last 8 bars", however many entries they produced.

use crate::candidate::Role;
use crate::style::{HatMode, SectionType, Subdivision};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Penalty applied when a fill would repeat the previous section's shape.
pub const FILL_REPEAT_PENALTY: f64 = 0.8;

/// A fill gesture, summarized for repetition comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillShape {
    /// Bar position within its section (0-based).
    pub bar_in_section: u32,
    pub roles: BTreeSet<Role>,
    /// Density level in [0, 1].
    pub density: f64,
    pub duration_bars: u32,
    pub tag: Option<String>,
}

impl FillShape {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Memory tuning knobs. Validated at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Operator-usage window, in bars.
    pub usage_window_bars: u32,
    /// Ghost-note count window, in bars.
    pub ghost_window_bars: u32,
    /// Density tolerance when comparing fill shapes.
    pub fill_density_tolerance: f64,
    /// Which section type accumulates the crash pattern.
    pub chorus_section: SectionType,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            usage_window_bars: 8,
            ghost_window_bars: 4,
            fill_density_tolerance: 0.1,
            chorus_section: SectionType::Chorus,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FillRecord {
    bar: u32,
    shape: FillShape,
    section: SectionType,
}

/// Read-only snapshot of memory state, surfaced in diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub recent_operator_usage: BTreeMap<String, u32>,
    pub last_fill_bar: Option<u32>,
    pub crash_pattern_beats: Vec<f64>,
    pub hat_changes: usize,
    pub ghost_frequency: f64,
}

/// Rolling per-run memory for one drum agent.
#[derive(Debug, Clone)]
pub struct AgentMemory {
    config: MemoryConfig,
    usage: VecDeque<(u32, String)>,
    section_tags: BTreeMap<SectionType, BTreeSet<String>>,
    last_fill: Option<FillRecord>,
    previous_section_fill: Option<FillShape>,
    crash_pattern: Vec<f64>,
    hat_history: Vec<(u32, HatMode, Subdivision)>,
    ghosts: VecDeque<(u32, u32)>,
}

impl AgentMemory {
    /// Panics on non-positive windows or a tolerance outside [0, 1].
    pub fn new(config: MemoryConfig) -> Self {
        assert!(
            config.usage_window_bars >= 1,
            "AgentMemory: usage_window_bars must be >= 1 (got {})",
            config.usage_window_bars
        );
        assert!(
            config.ghost_window_bars >= 1,
            "AgentMemory: ghost_window_bars must be >= 1 (got {})",
            config.ghost_window_bars
        );
        assert!(
            (0.0..=1.0).contains(&config.fill_density_tolerance),
            "AgentMemory: fill_density_tolerance must be in [0, 1] (got {})",
            config.fill_density_tolerance
        );
        AgentMemory {
            config,
            usage: VecDeque::new(),
            section_tags: BTreeMap::new(),
            last_fill: None,
            previous_section_fill: None,
            crash_pattern: Vec::new(),
            hat_history: Vec::new(),
            ghosts: VecDeque::new(),
        }
    }

    // ── Operator usage ──

    /// Record that an operator's candidate was selected in `bar`.
    pub fn record_decision(&mut self, bar: u32, operator: &str) {
        assert!(bar >= 1, "record_decision: bar must be >= 1 (got {bar})");
        self.usage.push_back((bar, operator.to_string()));
        let window = self.config.usage_window_bars;
        while let Some(&(b, _)) = self.usage.front() {
            if b + window <= bar {
                self.usage.pop_front();
            } else {
                break;
            }
        }
    }

    /// How often `operator` was selected within the usage window.
    pub fn recent_operator_usage(&self, operator: &str) -> u32 {
        self.usage.iter().filter(|(_, op)| op == operator).count() as u32
    }

    /// All in-window usage counts, for diagnostics.
    pub fn usage_counts(&self) -> BTreeMap<String, u32> {
        let mut counts: FxHashMap<&str, u32> = FxHashMap::default();
        for (_, op) in &self.usage {
            *counts.entry(op).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(op, n)| (op.to_string(), n))
            .collect()
    }

    /// Anti-repetition penalty in [0, 0.9], monotonic in recent usage.
    pub fn repetition_penalty(&self, operator: &str) -> f64 {
        let n = self.recent_operator_usage(operator);
        (0.25 * f64::from(n)).min(0.9)
    }

    // ── Fills ──

    /// Record a finalized fill. The previous fill rotates into the
    /// previous-section slot only when the section type changes.
    pub fn record_fill(&mut self, bar: u32, shape: FillShape, section: SectionType) {
        assert!(bar >= 1, "record_fill: bar must be >= 1 (got {bar})");
        if let Some(prev) = &self.last_fill {
            if prev.section != section {
                self.previous_section_fill = Some(prev.shape.clone());
            }
        }
        self.last_fill = Some(FillRecord { bar, shape, section });
    }

    pub fn last_fill_bar(&self) -> Option<u32> {
        self.last_fill.as_ref().map(|f| f.bar)
    }

    /// Would `shape` repeat the previous section's fill?
    ///
    /// True only when a previous-section baseline exists, the role sets
    /// match exactly, and the densities are within the configured tolerance.
    /// An empty shape never repeats.
    pub fn would_repeat_previous_section_fill(&self, shape: &FillShape) -> bool {
        if shape.is_empty() {
            return false;
        }
        match &self.previous_section_fill {
            None => false,
            Some(prev) => {
                prev.roles == shape.roles
                    && (prev.density - shape.density).abs() <= self.config.fill_density_tolerance
            }
        }
    }

    /// 0.0, or the fixed high penalty when the shape would repeat.
    pub fn fill_repetition_penalty(&self, shape: &FillShape) -> f64 {
        if self.would_repeat_previous_section_fill(shape) {
            FILL_REPEAT_PENALTY
        } else {
            0.0
        }
    }

    // ── Crash pattern ──

    /// Record a crash hit. Only the chorus-equivalent section accumulates.
    pub fn record_crash_hit(&mut self, beat: f64, section: SectionType) {
        assert!(
            beat.is_finite() && beat >= 1.0,
            "record_crash_hit: beat must be finite and >= 1.0 (got {beat})"
        );
        if section != self.config.chorus_section {
            return;
        }
        if self.crash_pattern.iter().any(|b| (b - beat).abs() < 1e-9) {
            return;
        }
        self.crash_pattern.push(beat);
        self.crash_pattern.sort_by(|a, b| a.total_cmp(b));
    }

    /// A pattern counts as established once two distinct beats are recorded.
    pub fn crash_pattern_established(&self) -> bool {
        self.crash_pattern.len() >= 2
    }

    /// Permissive before establishment, exact membership after.
    pub fn is_crash_beat_in_pattern(&self, beat: f64) -> bool {
        if !self.crash_pattern_established() {
            return true;
        }
        self.crash_pattern.iter().any(|b| (b - beat).abs() < 1e-9)
    }

    // ── Hat history ──

    /// Record a hat mode/subdivision change. A no-op when identical to the
    /// latest entry, so repeated per-bar recording doesn't bloat history.
    pub fn record_hat_mode_change(&mut self, bar: u32, mode: HatMode, subdivision: Subdivision) {
        assert!(bar >= 1, "record_hat_mode_change: bar must be >= 1 (got {bar})");
        if let Some(&(_, last_mode, last_sub)) = self.hat_history.last() {
            if last_mode == mode && last_sub == subdivision {
                return;
            }
        }
        self.hat_history.push((bar, mode, subdivision));
    }

    /// Most recent hat state at or before `bar`, if any.
    pub fn hat_mode_at(&self, bar: u32) -> Option<(HatMode, Subdivision)> {
        self.hat_history
            .iter()
            .rev()
            .find(|(b, _, _)| *b <= bar)
            .map(|&(_, mode, sub)| (mode, sub))
    }

    pub fn hat_change_count(&self) -> usize {
        self.hat_history.len()
    }

    // ── Ghost notes ──

    /// Record the ghost-note count selected for a bar.
    pub fn record_ghost_notes(&mut self, bar: u32, count: u32) {
        assert!(bar >= 1, "record_ghost_notes: bar must be >= 1 (got {bar})");
        self.ghosts.push_back((bar, count));
        let window = self.config.ghost_window_bars;
        while let Some(&(b, _)) = self.ghosts.front() {
            if b + window <= bar {
                self.ghosts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Mean ghost count over the window; 0.0 when nothing is recorded.
    pub fn ghost_note_frequency(&self) -> f64 {
        if self.ghosts.is_empty() {
            return 0.0;
        }
        let total: u32 = self.ghosts.iter().map(|&(_, n)| n).sum();
        f64::from(total) / self.ghosts.len() as f64
    }

    // ── Section signature tags ──

    /// Tag a section type with a signature the selection engine observed
    /// (e.g. "four-on-floor", "ride").
    pub fn record_section_tag(&mut self, section: SectionType, tag: &str) {
        self.section_tags
            .entry(section)
            .or_default()
            .insert(tag.to_string());
    }

    pub fn section_tags(&self, section: SectionType) -> Option<&BTreeSet<String>> {
        self.section_tags.get(&section)
    }

    // ── Lifecycle ──

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            recent_operator_usage: self.usage_counts(),
            last_fill_bar: self.last_fill_bar(),
            crash_pattern_beats: self.crash_pattern.clone(),
            hat_changes: self.hat_history.len(),
            ghost_frequency: self.ghost_note_frequency(),
        }
    }

    /// Reset every field to the just-constructed state.
    pub fn clear(&mut self) {
        self.usage.clear();
        self.section_tags.clear();
        self.last_fill = None;
        self.previous_section_fill = None;
        self.crash_pattern.clear();
        self.hat_history.clear();
        self.ghosts.clear();
    }
}

impl Default for AgentMemory {
    fn default() -> Self {
        AgentMemory::new(MemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(roles: &[Role], density: f64) -> FillShape {
        FillShape {
            bar_in_section: 3,
            roles: roles.iter().copied().collect(),
            density,
            duration_bars: 1,
            tag: None,
        }
    }

    #[test]
    fn usage_window_evicts_by_bar_distance() {
        let mut mem = AgentMemory::new(MemoryConfig {
            usage_window_bars: 2,
            ..MemoryConfig::default()
        });
        mem.record_decision(1, "GhostBefore");
        mem.record_decision(2, "GhostBefore");
        assert_eq!(mem.recent_operator_usage("GhostBefore"), 2);
        mem.record_decision(3, "HatAccent");
        // Bar 1 is now outside the 2-bar window.
        assert_eq!(mem.recent_operator_usage("GhostBefore"), 1);
        assert_eq!(mem.recent_operator_usage("HatAccent"), 1);
    }

    #[test]
    fn repetition_penalty_grows_monotonically() {
        let mut mem = AgentMemory::default();
        let mut last = mem.repetition_penalty("GhostBefore");
        assert_eq!(last, 0.0);
        for _ in 0..6 {
            mem.record_decision(1, "GhostBefore");
            let p = mem.repetition_penalty("GhostBefore");
            assert!(p >= last);
            last = p;
        }
        assert!(last <= 0.9);
    }

    #[test]
    fn fill_rotation_only_on_section_transition() {
        let mut mem = AgentMemory::default();
        let verse_fill = shape(&[Role::Snare, Role::FloorTom], 0.6);

        mem.record_fill(4, verse_fill.clone(), SectionType::Verse);
        // Same section: no previous-section baseline yet.
        mem.record_fill(8, shape(&[Role::Snare], 0.4), SectionType::Verse);
        assert!(!mem.would_repeat_previous_section_fill(&verse_fill));

        // Transition to chorus rotates the last verse fill.
        mem.record_fill(12, shape(&[Role::Snare], 0.45), SectionType::Chorus);
        assert!(mem.would_repeat_previous_section_fill(&shape(&[Role::Snare], 0.42)));
    }

    #[test]
    fn would_repeat_requires_exact_roles_and_close_density() {
        let mut mem = AgentMemory::default();
        mem.record_fill(4, shape(&[Role::Snare, Role::FloorTom], 0.6), SectionType::Verse);
        mem.record_fill(8, shape(&[Role::Snare], 0.5), SectionType::Chorus);

        // Baseline is the verse fill: {Snare, FloorTom} @ 0.6, tolerance 0.1.
        assert!(mem.would_repeat_previous_section_fill(&shape(
            &[Role::Snare, Role::FloorTom],
            0.65
        )));
        // Density outside tolerance.
        assert!(!mem.would_repeat_previous_section_fill(&shape(
            &[Role::Snare, Role::FloorTom],
            0.8
        )));
        // Same density, different role set.
        assert!(!mem.would_repeat_previous_section_fill(&shape(&[Role::Snare], 0.6)));
        // Empty shape never repeats.
        assert!(!mem.would_repeat_previous_section_fill(&shape(&[], 0.6)));
    }

    #[test]
    fn no_baseline_means_no_repeat() {
        let mem = AgentMemory::default();
        assert!(!mem.would_repeat_previous_section_fill(&shape(&[Role::Snare], 0.5)));
        assert_eq!(mem.fill_repetition_penalty(&shape(&[Role::Snare], 0.5)), 0.0);
    }

    #[test]
    fn fill_penalty_is_zero_or_fixed_constant() {
        let mut mem = AgentMemory::default();
        mem.record_fill(4, shape(&[Role::Snare], 0.5), SectionType::Verse);
        mem.record_fill(8, shape(&[Role::Kick], 0.3), SectionType::Chorus);
        assert_eq!(
            mem.fill_repetition_penalty(&shape(&[Role::Snare], 0.5)),
            FILL_REPEAT_PENALTY
        );
        assert_eq!(mem.fill_repetition_penalty(&shape(&[Role::Kick], 0.3)), 0.0);
    }

    #[test]
    fn crash_pattern_chorus_only_and_sorted() {
        let mut mem = AgentMemory::default();
        mem.record_crash_hit(3.0, SectionType::Verse);
        assert!(!mem.crash_pattern_established());
        // Permissive before establishment.
        assert!(mem.is_crash_beat_in_pattern(2.5));

        mem.record_crash_hit(3.0, SectionType::Chorus);
        assert!(!mem.crash_pattern_established());
        mem.record_crash_hit(1.0, SectionType::Chorus);
        assert!(mem.crash_pattern_established());

        assert!(mem.is_crash_beat_in_pattern(1.0));
        assert!(mem.is_crash_beat_in_pattern(3.0));
        assert!(!mem.is_crash_beat_in_pattern(2.0));
        assert_eq!(mem.snapshot().crash_pattern_beats, vec![1.0, 3.0]);
    }

    #[test]
    #[should_panic(expected = "beat must be finite and >= 1.0")]
    fn crash_hit_invalid_beat_panics() {
        let mut mem = AgentMemory::default();
        mem.record_crash_hit(0.5, SectionType::Chorus);
    }

    #[test]
    fn hat_history_dedups_and_looks_up_by_bar() {
        let mut mem = AgentMemory::default();
        assert_eq!(mem.hat_mode_at(10), None);

        mem.record_hat_mode_change(2, HatMode::Closed, Subdivision::Eighth);
        mem.record_hat_mode_change(3, HatMode::Closed, Subdivision::Eighth); // dedup
        mem.record_hat_mode_change(9, HatMode::Ride, Subdivision::Sixteenth);
        assert_eq!(mem.hat_change_count(), 2);

        assert_eq!(mem.hat_mode_at(1), None);
        assert_eq!(mem.hat_mode_at(2), Some((HatMode::Closed, Subdivision::Eighth)));
        assert_eq!(mem.hat_mode_at(8), Some((HatMode::Closed, Subdivision::Eighth)));
        assert_eq!(mem.hat_mode_at(9), Some((HatMode::Ride, Subdivision::Sixteenth)));
        assert_eq!(mem.hat_mode_at(40), Some((HatMode::Ride, Subdivision::Sixteenth)));
    }

    #[test]
    fn ghost_frequency_is_windowed_mean() {
        let mut mem = AgentMemory::new(MemoryConfig {
            ghost_window_bars: 2,
            ..MemoryConfig::default()
        });
        assert_eq!(mem.ghost_note_frequency(), 0.0);
        mem.record_ghost_notes(1, 10);
        mem.record_ghost_notes(2, 20);
        mem.record_ghost_notes(3, 2);
        mem.record_ghost_notes(4, 4);
        // Window of 2 bars keeps bars 3 and 4.
        assert_eq!(mem.ghost_note_frequency(), 3.0);
    }

    #[test]
    #[should_panic(expected = "bar must be >= 1")]
    fn ghost_notes_zero_bar_panics() {
        let mut mem = AgentMemory::default();
        mem.record_ghost_notes(0, 3);
    }

    #[test]
    #[should_panic(expected = "usage_window_bars must be >= 1")]
    fn zero_usage_window_panics() {
        AgentMemory::new(MemoryConfig {
            usage_window_bars: 0,
            ..MemoryConfig::default()
        });
    }

    #[test]
    #[should_panic(expected = "fill_density_tolerance must be in [0, 1]")]
    fn out_of_range_tolerance_panics() {
        AgentMemory::new(MemoryConfig {
            fill_density_tolerance: 1.5,
            ..MemoryConfig::default()
        });
    }

    #[test]
    fn clear_resets_everything() {
        let mut mem = AgentMemory::default();
        mem.record_decision(1, "GhostBefore");
        mem.record_fill(4, shape(&[Role::Snare], 0.5), SectionType::Verse);
        mem.record_crash_hit(1.0, SectionType::Chorus);
        mem.record_hat_mode_change(2, HatMode::Ride, Subdivision::Eighth);
        mem.record_ghost_notes(3, 5);
        mem.record_section_tag(SectionType::Chorus, "four-on-floor");

        mem.clear();
        assert_eq!(mem.recent_operator_usage("GhostBefore"), 0);
        assert_eq!(mem.last_fill_bar(), None);
        assert!(!mem.crash_pattern_established());
        assert_eq!(mem.hat_mode_at(100), None);
        assert_eq!(mem.ghost_note_frequency(), 0.0);
        assert_eq!(mem.section_tags(SectionType::Chorus), None);
    }
}
