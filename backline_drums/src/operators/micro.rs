// MicroAddition family: small embellishments (ghosts, pickups, accents)
// layered onto an existing groove. All of them stand down inside fill
// windows so they never fight the punctuation family for the same beats.

use crate::candidate::{ArticulationHint, DrumCandidate, Role, Strength};
use crate::context::DrummerContext;
use crate::operators::{clamp01, op_stream, DrumOperator, OperatorError, OperatorFamily};

fn ghost_velocity(rng: &mut backline_prng::DrumRng) -> u8 {
    (26 + rng.jitter_i8(6) as i16).clamp(12, 40) as u8
}

/// Ghost snare a sixteenth before each backbeat.
pub struct GhostBefore;

impl DrumOperator for GhostBefore {
    fn id(&self) -> &'static str {
        "GhostBefore"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        !ctx.fill_window
            && ctx.is_active(Role::Snare)
            && ctx.energy >= 0.25
            && !ctx.backbeats.is_empty()
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut rng = op_stream(ctx, self.id());
        Ok(ctx
            .backbeats
            .iter()
            .map(|&b| {
                DrumCandidate::new(self.id(), Role::Snare, ctx.bar, f64::from(b) - 0.25, Strength::Ghost)
                    .velocity(ghost_velocity(&mut rng))
            })
            .collect())
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.35 + 0.4 * ctx.energy)
    }
}

/// Ghost snare a sixteenth after each backbeat; wants a little more energy
/// than `GhostBefore` since it pushes into the next beat.
pub struct GhostAfter;

impl DrumOperator for GhostAfter {
    fn id(&self) -> &'static str {
        "GhostAfter"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        !ctx.fill_window
            && ctx.is_active(Role::Snare)
            && ctx.energy >= 0.35
            && !ctx.backbeats.is_empty()
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut rng = op_stream(ctx, self.id());
        Ok(ctx
            .backbeats
            .iter()
            .map(|&b| {
                DrumCandidate::new(self.id(), Role::Snare, ctx.bar, f64::from(b) + 0.25, Strength::Ghost)
                    .velocity(ghost_velocity(&mut rng))
            })
            .collect())
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.3 + 0.4 * ctx.energy)
    }
}

/// Kick on the "and" of the last beat, leading into the next bar.
pub struct KickPickup;

impl DrumOperator for KickPickup {
    fn id(&self) -> &'static str {
        "KickPickup"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        !ctx.fill_window && ctx.is_active(Role::Kick) && ctx.energy >= 0.3
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let beat = f64::from(ctx.beats_per_bar) + 0.5;
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, beat, Strength::Pickup)
                .velocity(78),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        // More useful approaching a section end.
        clamp01(0.3 + 0.3 * ctx.energy + 0.2 * ctx.phrase_position)
    }
}

/// Doubled kick: an extra hit on the "and" of beat one.
pub struct KickDouble;

impl DrumOperator for KickDouble {
    fn id(&self) -> &'static str {
        "KickDouble"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        !ctx.fill_window && ctx.is_active(Role::Kick) && ctx.energy >= 0.5
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, 1.5, Strength::Offbeat)
                .velocity(84),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.25 + 0.5 * ctx.energy)
    }
}

/// Open-hat accent on a stream-chosen offbeat.
pub struct HatAccent;

impl DrumOperator for HatAccent {
    fn id(&self) -> &'static str {
        "HatAccent"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        use crate::style::Subdivision;
        !ctx.fill_window
            && ctx.is_active(Role::ClosedHat)
            && ctx.energy >= 0.4
            && matches!(ctx.hat_subdivision, Subdivision::Eighth | Subdivision::Sixteenth)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut rng = op_stream(ctx, self.id());
        let offbeats = super::offbeats(ctx.beats_per_bar);
        let pick = rng.range_usize(0, offbeats.len());
        Ok(vec![
            DrumCandidate::new(self.id(), Role::ClosedHat, ctx.bar, offbeats[pick], Strength::Offbeat)
                .articulation(ArticulationHint::OpenHat)
                .velocity(92),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.3 + 0.35 * ctx.energy + 0.15 * ctx.tension)
    }
}

/// Flam/drag grace into the first backbeat.
pub struct SnareDrag;

impl DrumOperator for SnareDrag {
    fn id(&self) -> &'static str {
        "SnareDrag"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        !ctx.fill_window
            && ctx.is_active(Role::Snare)
            && ctx.energy >= 0.45
            && ctx.tension >= 0.3
            && !ctx.backbeats.is_empty()
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let first_backbeat = f64::from(ctx.backbeats[0]);
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Snare, ctx.bar, first_backbeat - 0.125, Strength::Ghost)
                .articulation(ArticulationHint::Flam)
                .velocity(34),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.2 + 0.3 * ctx.energy + 0.3 * ctx.tension)
    }
}

/// Floor-tom color note on the mid-bar offbeat.
pub struct TomColor;

impl DrumOperator for TomColor {
    fn id(&self) -> &'static str {
        "TomColor"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MicroAddition
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        !ctx.fill_window && ctx.energy >= 0.55 && ctx.tension >= 0.4 && ctx.beats_per_bar >= 3
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mid = f64::from(ctx.beats_per_bar / 2 + 1) + 0.5;
        Ok(vec![
            DrumCandidate::new(self.id(), Role::FloorTom, ctx.bar, mid, Strength::Offbeat)
                .velocity(70),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.15 + 0.35 * ctx.energy + 0.3 * ctx.tension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{ctx, fill_ctx, CtxSpec};

    fn all_ops() -> Vec<Box<dyn DrumOperator>> {
        vec![
            Box::new(GhostBefore),
            Box::new(GhostAfter),
            Box::new(KickPickup),
            Box::new(KickDouble),
            Box::new(HatAccent),
            Box::new(SnareDrag),
            Box::new(TomColor),
        ]
    }

    #[test]
    fn inapplicable_context_yields_empty() {
        // Fill window suppresses every micro operator.
        let c = fill_ctx(0.9, 0.9);
        for op in all_ops() {
            assert!(!op.can_apply(&c), "{}", op.id());
            assert!(op.generate(&c).unwrap().is_empty(), "{}", op.id());
        }
    }

    #[test]
    fn generation_is_deterministic_and_valid() {
        let c = ctx(CtxSpec {
            energy: 0.8,
            tension: 0.6,
            ..CtxSpec::default()
        });
        for op in all_ops() {
            let a = op.generate(&c).unwrap();
            let b = op.generate(&c).unwrap();
            assert_eq!(a, b, "{}", op.id());
            assert!(op.can_apply(&c), "{}", op.id());
            assert!(!a.is_empty(), "{}", op.id());
            for mut cand in a {
                cand.score = op.score(&cand, &c);
                assert!((0.0..=1.0).contains(&cand.score), "{}", op.id());
                assert_eq!(cand.validate(), Ok(()), "{}", op.id());
            }
        }
    }

    #[test]
    fn ghost_before_lands_before_backbeats() {
        let c = ctx(CtxSpec::default());
        let cands = GhostBefore.generate(&c).unwrap();
        let beats: Vec<f64> = cands.iter().map(|c| c.beat).collect();
        assert_eq!(beats, vec![1.75, 3.75]);
        assert_eq!(cands[0].id, format!("GhostBefore_Snare_{}_1.75", c.bar));
        assert!(cands.iter().all(|c| c.strength == Strength::Ghost));
    }

    #[test]
    fn low_energy_gates_ghosts() {
        let c = ctx(CtxSpec {
            energy: 0.1,
            ..CtxSpec::default()
        });
        assert!(!GhostBefore.can_apply(&c));
        assert!(GhostBefore.generate(&c).unwrap().is_empty());
    }

    #[test]
    fn kick_pickup_sits_on_the_and_of_the_last_beat() {
        let c = ctx(CtxSpec::default());
        let cands = KickPickup.generate(&c).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].beat, 4.5);
        assert_eq!(cands[0].strength, Strength::Pickup);
    }

    #[test]
    fn hat_accent_requires_a_running_hat_grid() {
        use crate::style::{HatMode, Subdivision};
        let c = ctx(CtxSpec {
            energy: 0.5,
            hat: Some((HatMode::Closed, Subdivision::None)),
            ..CtxSpec::default()
        });
        assert!(!HatAccent.can_apply(&c));

        let c = ctx(CtxSpec {
            energy: 0.5,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        let cands = HatAccent.generate(&c).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].articulation, ArticulationHint::OpenHat);
        assert!(cands[0].beat.fract() == 0.5);
    }
}
