// StyleIdiom family: signature patterns that only make sense inside one
// style, gated on the context's style identifier on top of the usual
// energy/section conditions.

use crate::candidate::{ArticulationHint, DrumCandidate, Role, Strength};
use crate::context::DrummerContext;
use crate::operators::{
    clamp01, offbeats, op_stream, quarter_beats, DrumOperator, OperatorError, OperatorFamily,
};

/// Rimshot backbeats, the rock signature.
pub struct RockBackbeatAccent;

impl DrumOperator for RockBackbeatAccent {
    fn id(&self) -> &'static str {
        "RockBackbeatAccent"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::StyleIdiom
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.style == "rock" && ctx.is_active(Role::Snare) && !ctx.backbeats.is_empty()
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(ctx
            .backbeats
            .iter()
            .map(|&b| {
                DrumCandidate::new(self.id(), Role::Snare, ctx.bar, f64::from(b), Strength::Backbeat)
                    .articulation(ArticulationHint::Rimshot)
                    .velocity(110)
            })
            .collect())
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.5 + 0.3 * ctx.energy)
    }
}

/// Funk ghost lattice: a stream-chosen subset of off-grid sixteenth ghosts
/// woven between the backbeats.
pub struct FunkGhostWeave;

impl DrumOperator for FunkGhostWeave {
    fn id(&self) -> &'static str {
        "FunkGhostWeave"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::StyleIdiom
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.style == "funk" && ctx.is_active(Role::Snare) && ctx.energy >= 0.3 && !ctx.fill_window
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut rng = op_stream(ctx, self.id());
        let mut out = Vec::new();
        for beat in quarter_beats(ctx.beats_per_bar) {
            // Skip grid slots the backbeat already owns.
            if ctx.backbeats.contains(&(beat as u8)) {
                continue;
            }
            for offset in [0.25, 0.75] {
                if rng.chance(0.35 + 0.3 * ctx.energy) {
                    let velocity = (22 + rng.jitter_i8(5) as i16).clamp(12, 36) as u8;
                    out.push(
                        DrumCandidate::new(self.id(), Role::Snare, ctx.bar, beat + offset, Strength::Ghost)
                            .velocity(velocity),
                    );
                }
            }
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.35 + 0.4 * ctx.energy)
    }
}

/// Swung jazz ride with a feathered kick underneath.
pub struct JazzRideSwing;

impl DrumOperator for JazzRideSwing {
    fn id(&self) -> &'static str {
        "JazzRideSwing"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::StyleIdiom
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.style == "jazz" && ctx.is_active(Role::Kick)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for beat in quarter_beats(ctx.beats_per_bar) {
            out.push(
                DrumCandidate::new(self.id(), Role::Ride, ctx.bar, beat, Strength::Strong)
                    .articulation(ArticulationHint::Ride)
                    .velocity(76),
            );
            // The skip note: a swung "and", pushed late via the timing hint.
            out.push(
                DrumCandidate::new(self.id(), Role::Ride, ctx.bar, beat + 0.5, Strength::Offbeat)
                    .articulation(ArticulationHint::Ride)
                    .timing(0.08)
                    .velocity(62),
            );
            // Feathered kick: felt, not heard.
            out.push(
                DrumCandidate::new(self.id(), Role::Kick, ctx.bar, beat, Strength::Ghost)
                    .velocity(20),
            );
        }
        Ok(out)
    }

    fn score(&self, candidate: &DrumCandidate, _ctx: &DrummerContext) -> f64 {
        if candidate.role == Role::Ride { 0.7 } else { 0.4 }
    }
}

/// Disco: open hat barking on every offbeat.
pub struct DiscoOpenHat;

impl DrumOperator for DiscoOpenHat {
    fn id(&self) -> &'static str {
        "DiscoOpenHat"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::StyleIdiom
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.style == "disco" && ctx.energy >= 0.4
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(offbeats(ctx.beats_per_bar)
            .into_iter()
            .map(|beat| {
                DrumCandidate::new(self.id(), Role::OpenHat, ctx.bar, beat, Strength::Offbeat)
                    .articulation(ArticulationHint::OpenHat)
                    .velocity(88)
            })
            .collect())
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.4 + 0.4 * ctx.energy)
    }
}

/// Metal: relentless sixteenth double kick.
pub struct MetalDoubleKick;

impl DrumOperator for MetalDoubleKick {
    fn id(&self) -> &'static str {
        "MetalDoubleKick"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::StyleIdiom
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.style == "metal" && ctx.is_active(Role::Kick) && ctx.energy >= 0.6
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for b in 1..=ctx.beats_per_bar {
            for step in 0..4 {
                let beat = f64::from(b) + f64::from(step) * 0.25;
                let strength = if step == 0 { Strength::Strong } else { Strength::Ghost };
                out.push(
                    DrumCandidate::new(self.id(), Role::Kick, ctx.bar, beat, strength)
                        .velocity(94),
                );
            }
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.1 + 0.8 * ctx.energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{ctx, CtxSpec};

    fn all_ops() -> Vec<(Box<dyn DrumOperator>, &'static str)> {
        vec![
            (Box::new(RockBackbeatAccent) as Box<dyn DrumOperator>, "rock"),
            (Box::new(FunkGhostWeave), "funk"),
            (Box::new(JazzRideSwing), "jazz"),
            (Box::new(DiscoOpenHat), "disco"),
            (Box::new(MetalDoubleKick), "metal"),
        ]
    }

    #[test]
    fn style_gate_is_exact_and_case_sensitive() {
        for (op, style) in all_ops() {
            let home = ctx(CtxSpec {
                style,
                energy: 0.8,
                ..CtxSpec::default()
            });
            assert!(op.can_apply(&home), "{}", op.id());

            let away = ctx(CtxSpec {
                style: "bossa",
                energy: 0.8,
                ..CtxSpec::default()
            });
            assert!(!op.can_apply(&away), "{}", op.id());
            assert!(op.generate(&away).unwrap().is_empty(), "{}", op.id());
        }
    }

    #[test]
    fn idiom_candidates_validate_and_are_deterministic() {
        for (op, style) in all_ops() {
            let c = ctx(CtxSpec {
                style,
                energy: 0.8,
                ..CtxSpec::default()
            });
            let a = op.generate(&c).unwrap();
            assert_eq!(a, op.generate(&c).unwrap(), "{}", op.id());
            assert!(!a.is_empty(), "{}", op.id());
            for mut cand in a {
                cand.score = op.score(&cand, &c);
                assert_eq!(cand.validate(), Ok(()), "{}", op.id());
                assert!((0.0..=1.0).contains(&cand.score), "{}", op.id());
            }
        }
    }

    #[test]
    fn rock_accent_rimshots_the_backbeats() {
        let c = ctx(CtxSpec {
            style: "rock",
            ..CtxSpec::default()
        });
        let cands = RockBackbeatAccent.generate(&c).unwrap();
        let beats: Vec<f64> = cands.iter().map(|c| c.beat).collect();
        assert_eq!(beats, vec![2.0, 4.0]);
        assert!(cands.iter().all(|c| c.articulation == ArticulationHint::Rimshot));
        assert_eq!(cands[0].id, format!("RockBackbeatAccent_Snare_{}_2_Rimshot", c.bar));
    }

    #[test]
    fn funk_weave_avoids_backbeat_slots_and_stays_ghostly() {
        let c = ctx(CtxSpec {
            style: "funk",
            energy: 0.9,
            ..CtxSpec::default()
        });
        let cands = FunkGhostWeave.generate(&c).unwrap();
        assert!(!cands.is_empty());
        for cand in &cands {
            assert_eq!(cand.strength, Strength::Ghost);
            let base = cand.beat.floor() as u8;
            assert!(!c.backbeats.contains(&base), "ghost at {}", cand.beat);
            assert!(cand.velocity_hint.unwrap() <= 36);
        }
    }

    #[test]
    fn jazz_ride_swings_the_skip_note() {
        let c = ctx(CtxSpec {
            style: "jazz",
            ..CtxSpec::default()
        });
        let cands = JazzRideSwing.generate(&c).unwrap();
        let skips: Vec<&DrumCandidate> = cands
            .iter()
            .filter(|c| c.role == Role::Ride && c.beat.fract() == 0.5)
            .collect();
        assert_eq!(skips.len(), 4);
        assert!(skips.iter().all(|c| c.timing_hint == Some(0.08)));
        // Feathered kick stays out of the way.
        assert!(
            cands
                .iter()
                .filter(|c| c.role == Role::Kick)
                .all(|c| c.velocity_hint.unwrap() <= 24)
        );
    }

    #[test]
    fn metal_double_kick_fills_the_sixteenth_grid() {
        let c = ctx(CtxSpec {
            style: "metal",
            energy: 0.9,
            ..CtxSpec::default()
        });
        let cands = MetalDoubleKick.generate(&c).unwrap();
        assert_eq!(cands.len(), 16);
        assert!(cands.iter().all(|c| c.role == Role::Kick));
    }
}
