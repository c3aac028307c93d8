// Style configuration: the tunable surface of the drum engine.
//
// A style bundles everything the policy provider and candidate source need
// to adapt per bar: operator allow-list and weights, per-section base
// densities, per-role density defaults and event caps, and feel/grid rules.
// Built-in styles are plain constructors (the trained-corpus analogue lives
// outside this crate); a style can also be loaded from JSON.
//
// Section density ordering is part of each style's documented contract:
// Intro < Verse < Chorus and Bridge < Verse, tested below.

use crate::candidate::Role;
use crate::error::GrooveError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Song section kind, as reported by the section provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SectionType {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Outro,
}

impl SectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Intro => "Intro",
            SectionType::Verse => "Verse",
            SectionType::PreChorus => "PreChorus",
            SectionType::Chorus => "Chorus",
            SectionType::Bridge => "Bridge",
            SectionType::Outro => "Outro",
        }
    }
}

/// Hi-hat (or ride) pulse grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subdivision {
    None,
    Quarter,
    Eighth,
    Sixteenth,
}

/// Which surface carries the pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HatMode {
    Closed,
    Open,
    Ride,
}

/// Feel and grid rules for a style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeelRules {
    /// Swing amount in [0, 1]; 0 = straight.
    pub swing: f64,
    /// Base pulse grid before subdivision operators act.
    pub grid: Subdivision,
    /// Behind-the-beat snare offset in beats, when the style plays laid back.
    pub snare_behind: Option<f64>,
    /// Velocity bias applied in choruses (positive = louder).
    pub chorus_velocity_bias: i8,
    /// Velocity bias applied in bridges (negative = softer).
    pub bridge_velocity_bias: i8,
}

/// Complete style configuration. Immutable for a run's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfiguration {
    /// Style identifier; StyleIdiom operators gate on this.
    pub name: String,
    /// Operator allow-list. Empty means every registered operator is enabled.
    pub allowed_operators: Vec<String>,
    /// Per-operator selection weights; operators not listed weigh 1.0.
    pub operator_weights: BTreeMap<String, f64>,
    /// Base density per section type, each in [0, 1].
    pub section_density: BTreeMap<SectionType, f64>,
    /// Per-role density multipliers. Roles not listed are "unknown" to the
    /// policy provider.
    pub role_density: BTreeMap<Role, f64>,
    /// Per-role max-events-per-bar caps.
    pub role_caps: BTreeMap<Role, u8>,
    pub feel: FeelRules,
    /// Density reduction fraction applied per unit of motif presence.
    pub motif_reduction: f64,
    /// Cap on the total motif-driven reduction, regardless of presence.
    pub motif_reduction_cap: f64,
    /// Minimum spacing between fills, in bars.
    pub min_fill_spacing_bars: u32,
}

impl StyleConfiguration {
    /// Straight-eighths rock: loud backbeats, moderate ghost activity.
    pub fn rock() -> Self {
        StyleConfiguration {
            name: "rock".to_string(),
            allowed_operators: Vec::new(),
            operator_weights: BTreeMap::new(),
            section_density: section_density_table(&[
                (SectionType::Intro, 0.30),
                (SectionType::Verse, 0.50),
                (SectionType::PreChorus, 0.60),
                (SectionType::Chorus, 0.80),
                (SectionType::Bridge, 0.40),
                (SectionType::Outro, 0.35),
            ]),
            role_density: role_table(&[
                (Role::Kick, 1.0),
                (Role::Snare, 1.0),
                (Role::ClosedHat, 0.9),
                (Role::OpenHat, 0.6),
                (Role::Ride, 0.7),
                (Role::Crash, 0.5),
                (Role::HighTom, 0.5),
                (Role::MidTom, 0.5),
                (Role::FloorTom, 0.6),
            ]),
            role_caps: cap_table(&[
                (Role::Kick, 8),
                (Role::Snare, 10),
                (Role::ClosedHat, 16),
                (Role::OpenHat, 8),
                (Role::Ride, 16),
                (Role::Crash, 2),
                (Role::HighTom, 6),
                (Role::MidTom, 6),
                (Role::FloorTom, 6),
            ]),
            feel: FeelRules {
                swing: 0.0,
                grid: Subdivision::Eighth,
                snare_behind: None,
                chorus_velocity_bias: 8,
                bridge_velocity_bias: -6,
            },
            motif_reduction: 0.25,
            motif_reduction_cap: 0.40,
            min_fill_spacing_bars: 4,
        }
    }

    /// Sixteenth-grid funk: heavy ghost weave, laid-back snare.
    pub fn funk() -> Self {
        let mut style = StyleConfiguration::rock();
        style.name = "funk".to_string();
        style.section_density = section_density_table(&[
            (SectionType::Intro, 0.35),
            (SectionType::Verse, 0.60),
            (SectionType::PreChorus, 0.65),
            (SectionType::Chorus, 0.85),
            (SectionType::Bridge, 0.50),
            (SectionType::Outro, 0.40),
        ]);
        style.feel = FeelRules {
            swing: 0.15,
            grid: Subdivision::Sixteenth,
            snare_behind: Some(0.02),
            chorus_velocity_bias: 6,
            bridge_velocity_bias: -4,
        };
        style.role_caps.insert(Role::Snare, 14);
        style.min_fill_spacing_bars = 2;
        style
    }

    /// Swung ride jazz: feathered kick, quiet dynamics.
    pub fn jazz() -> Self {
        let mut style = StyleConfiguration::rock();
        style.name = "jazz".to_string();
        style.section_density = section_density_table(&[
            (SectionType::Intro, 0.25),
            (SectionType::Verse, 0.45),
            (SectionType::PreChorus, 0.50),
            (SectionType::Chorus, 0.65),
            (SectionType::Bridge, 0.35),
            (SectionType::Outro, 0.30),
        ]);
        style.feel = FeelRules {
            swing: 0.55,
            grid: Subdivision::Eighth,
            snare_behind: Some(0.03),
            chorus_velocity_bias: 4,
            bridge_velocity_bias: -5,
        };
        style.role_density.insert(Role::Ride, 1.0);
        style.role_density.insert(Role::ClosedHat, 0.5);
        style
    }

    /// Load a style from a JSON file.
    pub fn load(path: &Path) -> Result<Self, GrooveError> {
        let data = std::fs::read_to_string(path)?;
        let style: StyleConfiguration = serde_json::from_str(&data)?;
        Ok(style)
    }

    /// Selection weight for an operator (1.0 when unlisted).
    pub fn weight_for(&self, operator: &str) -> f64 {
        self.operator_weights.get(operator).copied().unwrap_or(1.0)
    }
}

fn section_density_table(entries: &[(SectionType, f64)]) -> BTreeMap<SectionType, f64> {
    entries.iter().copied().collect()
}

fn role_table(entries: &[(Role, f64)]) -> BTreeMap<Role, f64> {
    entries.iter().copied().collect()
}

fn cap_table(entries: &[(Role, u8)]) -> BTreeMap<Role, u8> {
    entries.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_section_ordering(style: &StyleConfiguration) {
        let d = |s: SectionType| style.section_density[&s];
        assert!(d(SectionType::Intro) < d(SectionType::Verse), "{}", style.name);
        assert!(d(SectionType::Verse) < d(SectionType::Chorus), "{}", style.name);
        assert!(d(SectionType::Bridge) < d(SectionType::Verse), "{}", style.name);
    }

    #[test]
    fn builtin_styles_respect_section_ordering() {
        assert_section_ordering(&StyleConfiguration::rock());
        assert_section_ordering(&StyleConfiguration::funk());
        assert_section_ordering(&StyleConfiguration::jazz());
    }

    #[test]
    fn builtin_densities_are_in_unit_range() {
        for style in [
            StyleConfiguration::rock(),
            StyleConfiguration::funk(),
            StyleConfiguration::jazz(),
        ] {
            for (&section, &d) in &style.section_density {
                assert!(
                    (0.0..=1.0).contains(&d),
                    "{} {:?}: {d}",
                    style.name,
                    section
                );
            }
        }
    }

    #[test]
    fn weight_defaults_to_one() {
        let mut style = StyleConfiguration::rock();
        assert_eq!(style.weight_for("GhostBefore"), 1.0);
        style.operator_weights.insert("GhostBefore".to_string(), 0.4);
        assert_eq!(style.weight_for("GhostBefore"), 0.4);
    }

    #[test]
    fn style_json_roundtrip() {
        let style = StyleConfiguration::funk();
        let json = serde_json::to_string(&style).unwrap();
        let restored: StyleConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(style, restored);
    }
}
