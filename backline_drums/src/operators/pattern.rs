// PatternSubstitution family: whole-groove swaps. Each operator owns a
// disjoint energy band, so at most one substitution can apply to any bar;
// the bands are the mutual-exclusion mechanism, not an arbiter.
//
// Band map: HalfTime [0, 0.35) | FourOnFloor [0.35, 0.6) |
// Breakbeat [0.6, 0.8) | DoubleTime [0.8, 1.0].

use crate::candidate::{ArticulationHint, DrumCandidate, Role, Strength};
use crate::context::DrummerContext;
use crate::operators::{
    clamp01, offbeats, op_stream, quarter_beats, DrumOperator, OperatorError, OperatorFamily,
};
use crate::style::SectionType;

fn backbeat_candidates(operator: &str, ctx: &DrummerContext, velocity: u8) -> Vec<DrumCandidate> {
    ctx.backbeats
        .iter()
        .map(|&b| {
            DrumCandidate::new(operator, Role::Snare, ctx.bar, f64::from(b), Strength::Backbeat)
                .velocity(velocity)
        })
        .collect()
}

/// Half-time feel: the snare moves to the bar's midpoint, kick on one,
/// quarter-note hats.
pub struct HalfTimeGroove;

impl DrumOperator for HalfTimeGroove {
    fn id(&self) -> &'static str {
        "HalfTimeGroove"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PatternSubstitution
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.energy < 0.35
            && matches!(
                ctx.section,
                SectionType::Verse | SectionType::Bridge | SectionType::Outro
            )
            && ctx.beats_per_bar >= 3
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mid = f64::from(ctx.beats_per_bar / 2 + 1);
        let mut out = vec![
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, 1.0, Strength::Downbeat)
                .velocity(96),
            DrumCandidate::new(self.id(), Role::Snare, ctx.bar, mid, Strength::Backbeat)
                .velocity(98),
        ];
        for beat in quarter_beats(ctx.beats_per_bar) {
            out.push(
                DrumCandidate::new(self.id(), Role::ClosedHat, ctx.bar, beat, Strength::Strong)
                    .velocity(56),
            );
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.75 - 0.5 * ctx.energy)
    }
}

/// Four-on-the-floor: kick on every quarter, open hat on the offbeats.
pub struct FourOnFloor;

impl DrumOperator for FourOnFloor {
    fn id(&self) -> &'static str {
        "FourOnFloor"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PatternSubstitution
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        (0.35..0.6).contains(&ctx.energy)
            && matches!(
                ctx.section,
                SectionType::Verse | SectionType::PreChorus | SectionType::Chorus
            )
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for beat in quarter_beats(ctx.beats_per_bar) {
            let strength = if beat == 1.0 { Strength::Downbeat } else { Strength::Strong };
            out.push(
                DrumCandidate::new(self.id(), Role::Kick, ctx.bar, beat, strength).velocity(100),
            );
        }
        out.extend(backbeat_candidates(self.id(), ctx, 102));
        for beat in offbeats(ctx.beats_per_bar) {
            out.push(
                DrumCandidate::new(self.id(), Role::ClosedHat, ctx.bar, beat, Strength::Offbeat)
                    .articulation(ArticulationHint::OpenHat)
                    .velocity(72),
            );
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        let chorus_bonus = if ctx.section == SectionType::Chorus { 0.15 } else { 0.0 };
        clamp01(0.4 + 0.3 * ctx.energy + chorus_bonus)
    }
}

/// Breakbeat: displaced kick and snare, stream-chosen between two classic
/// displacement variants.
pub struct BreakbeatGroove;

impl DrumOperator for BreakbeatGroove {
    fn id(&self) -> &'static str {
        "BreakbeatGroove"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PatternSubstitution
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        (0.6..0.8).contains(&ctx.energy)
            && matches!(
                ctx.section,
                SectionType::Verse | SectionType::Chorus | SectionType::Bridge
            )
            && ctx.beats_per_bar >= 4
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut rng = op_stream(ctx, self.id());
        // Two displacement flavors; the stream picks one per bar.
        let kicks: &[f64] = if rng.chance(0.5) {
            &[1.0, 2.75, 4.25]
        } else {
            &[1.0, 1.75, 3.5]
        };
        let mut out: Vec<DrumCandidate> = kicks
            .iter()
            .map(|&beat| {
                let strength = if beat == 1.0 { Strength::Downbeat } else { Strength::Offbeat };
                DrumCandidate::new(self.id(), Role::Kick, ctx.bar, beat, strength).velocity(98)
            })
            .collect();
        out.extend(backbeat_candidates(self.id(), ctx, 104));
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.3 + 0.45 * ctx.energy + 0.1 * ctx.tension)
    }
}

/// Double-time feel: snare on every offbeat over a driving kick.
pub struct DoubleTimeGroove;

impl DrumOperator for DoubleTimeGroove {
    fn id(&self) -> &'static str {
        "DoubleTimeGroove"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PatternSubstitution
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.energy >= 0.8
            && matches!(ctx.section, SectionType::Chorus | SectionType::PreChorus)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for beat in quarter_beats(ctx.beats_per_bar) {
            let strength = if beat == 1.0 { Strength::Downbeat } else { Strength::Strong };
            out.push(
                DrumCandidate::new(self.id(), Role::Kick, ctx.bar, beat, strength).velocity(102),
            );
        }
        for beat in offbeats(ctx.beats_per_bar) {
            out.push(
                DrumCandidate::new(self.id(), Role::Snare, ctx.bar, beat, Strength::Backbeat)
                    .velocity(100),
            );
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.2 + 0.7 * ctx.energy)
    }
}
