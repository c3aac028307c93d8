// Policy provider: per-bar, per-role overrides derived from style + memory.
//
// `get_policy` is deterministic for a fixed (bar, role, style, memory
// state): it never draws randomness, so the selection engine can call it as
// often as it likes. A role the style knows nothing about gets the
// no-overrides sentinel rather than an error, and the selection engine
// falls back to its own defaults for that role.

use crate::candidate::Role;
use crate::context::DrummerContext;
use crate::memory::AgentMemory;
use crate::style::{SectionType, StyleConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag enabling fill operators' candidates for selection this bar.
pub const FILL_TAG: &str = "fill";
/// Tag marking the first bar of a section.
pub const SECTION_START_TAG: &str = "section-start";

/// Per-bar, per-role overrides. All fields optional; `PolicyDecision::none()`
/// is the canonical "no overrides" value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Target density in [0, 1].
    pub density: Option<f64>,
    pub max_events_per_bar: Option<u8>,
    /// Timing feel override in beats (positive = behind the beat).
    pub timing_feel: Option<f64>,
    pub velocity_bias: Option<i8>,
    pub enabled_tags: Option<BTreeSet<String>>,
}

impl PolicyDecision {
    /// The canonical no-overrides sentinel.
    pub fn none() -> Self {
        PolicyDecision::default()
    }

    pub fn is_none(&self) -> bool {
        self.density.is_none()
            && self.max_events_per_bar.is_none()
            && self.timing_feel.is_none()
            && self.velocity_bias.is_none()
            && self.enabled_tags.is_none()
    }
}

/// Computes policy decisions against one immutable style.
#[derive(Debug, Clone)]
pub struct PolicyProvider<'a> {
    style: &'a StyleConfiguration,
}

impl<'a> PolicyProvider<'a> {
    pub fn new(style: &'a StyleConfiguration) -> Self {
        PolicyProvider { style }
    }

    pub fn get_policy(
        &self,
        ctx: &DrummerContext,
        role: Role,
        memory: &AgentMemory,
    ) -> PolicyDecision {
        let known = self.style.role_density.contains_key(&role)
            || self.style.role_caps.contains_key(&role);
        if !known {
            return PolicyDecision::none();
        }

        PolicyDecision {
            density: Some(self.density_for(ctx, role)),
            max_events_per_bar: self.style.role_caps.get(&role).copied(),
            timing_feel: self.timing_for(ctx, role),
            velocity_bias: self.velocity_bias_for(ctx),
            enabled_tags: self.tags_for(ctx, memory),
        }
    }

    /// Section base density x role default, thinned by motif presence,
    /// clamped to [0, 1].
    fn density_for(&self, ctx: &DrummerContext, role: Role) -> f64 {
        let base = self
            .style
            .section_density
            .get(&ctx.section)
            .copied()
            .unwrap_or(0.5);
        let role_factor = self.style.role_density.get(&role).copied().unwrap_or(1.0);
        let mut density = base * role_factor;

        // The kick anchors the pulse; motif thinning spares it.
        if role != Role::Kick && ctx.motif_presence > 0.0 {
            let reduction = (ctx.motif_presence * self.style.motif_reduction)
                .min(self.style.motif_reduction_cap);
            density *= 1.0 - reduction;
        }

        density.clamp(0.0, 1.0)
    }

    fn timing_for(&self, ctx: &DrummerContext, role: Role) -> Option<f64> {
        // Laid-back snare only in groove sections; boundaries and intros
        // stay on the grid.
        if role != Role::Snare {
            return None;
        }
        match ctx.section {
            SectionType::Verse | SectionType::Chorus | SectionType::Bridge => {
                self.style.feel.snare_behind
            }
            _ => None,
        }
    }

    fn velocity_bias_for(&self, ctx: &DrummerContext) -> Option<i8> {
        let bias = match ctx.section {
            SectionType::Chorus => self.style.feel.chorus_velocity_bias,
            SectionType::Bridge => self.style.feel.bridge_velocity_bias,
            _ => 0,
        };
        if bias == 0 { None } else { Some(bias) }
    }

    fn tags_for(&self, ctx: &DrummerContext, memory: &AgentMemory) -> Option<BTreeSet<String>> {
        let mut tags = BTreeSet::new();

        if ctx.fill_window {
            let spaced = match memory.last_fill_bar() {
                None => true,
                Some(last) => ctx.bar.saturating_sub(last) >= self.style.min_fill_spacing_bars,
            };
            if spaced {
                tags.insert(FILL_TAG.to_string());
            }
        }

        if ctx.is_section_start() {
            tags.insert(SECTION_START_TAG.to_string());
        }

        if tags.is_empty() { None } else { Some(tags) }
    }
}
