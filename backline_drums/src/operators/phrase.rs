// PhrasePunctuation family: the gestures that mark phrase and section
// edges (crashes, setups, fills, stop-time). Every operator here gates on
// the fill window and/or the section boundary, which is exactly the ground
// the micro family vacates.

use crate::candidate::{ArticulationHint, DrumCandidate, FillRole, Role, Strength};
use crate::context::DrummerContext;
use crate::operators::{clamp01, op_stream, DrumOperator, OperatorError, OperatorFamily};

/// Crash + kick on the downbeat of a section's first bar.
pub struct CrashOnOne;

impl DrumOperator for CrashOnOne {
    fn id(&self) -> &'static str {
        "CrashOnOne"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.section_boundary && ctx.is_section_start()
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Crash, ctx.bar, 1.0, Strength::Downbeat)
                .articulation(ArticulationHint::Crash)
                .velocity(112),
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, 1.0, Strength::Downbeat)
                .velocity(104),
        ])
    }

    fn score(&self, candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        let crash_bonus = if candidate.role == Role::Crash { 0.15 } else { 0.0 };
        clamp01(0.5 + 0.3 * ctx.energy + crash_bonus)
    }
}

/// Syncopated kick setup in the bar(s) leading into a fill.
pub struct SetupKick;

impl DrumOperator for SetupKick {
    fn id(&self) -> &'static str {
        "SetupKick"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.fill_window && ctx.is_active(Role::Kick)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let last = f64::from(ctx.beats_per_bar);
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, last - 0.5, Strength::Offbeat)
                .fill_role(FillRole::Setup)
                .velocity(88),
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, last + 0.25, Strength::Pickup)
                .fill_role(FillRole::Setup)
                .velocity(82),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.35 + 0.3 * ctx.energy + 0.2 * ctx.tension)
    }
}

/// Sixteenth-note snare run over the last two beats of the bar.
pub struct SnareFill16;

impl DrumOperator for SnareFill16 {
    fn id(&self) -> &'static str {
        "SnareFill16"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.fill_window
            && ctx.is_section_last_bar()
            && ctx.is_active(Role::Snare)
            && ctx.beats_per_bar >= 2
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut rng = op_stream(ctx, self.id());
        let start = f64::from(ctx.beats_per_bar - 1);
        let steps = 8; // two beats of sixteenths
        let mut out = Vec::with_capacity(steps);
        for i in 0..steps {
            let beat = start + i as f64 * 0.25;
            let fill_role = match i {
                0 => FillRole::FillStart,
                _ if i == steps - 1 => FillRole::FillEnd,
                _ => FillRole::FillBody,
            };
            // Velocity ramps into the downbeat, with a little humanization.
            let velocity = (70 + (i as i16) * 5 + i16::from(rng.jitter_i8(4))).clamp(40, 120) as u8;
            out.push(
                DrumCandidate::new(self.id(), Role::Snare, ctx.bar, beat, Strength::Strong)
                    .fill_role(fill_role)
                    .velocity(velocity),
            );
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.4 + 0.3 * ctx.energy + 0.2 * ctx.tension)
    }
}

/// Descending tom run across the back half of the bar.
pub struct TomRunDown;

impl DrumOperator for TomRunDown {
    fn id(&self) -> &'static str {
        "TomRunDown"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.fill_window && ctx.is_section_last_bar() && ctx.energy >= 0.5 && ctx.beats_per_bar >= 3
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let start = f64::from(ctx.beats_per_bar - 1);
        let lane = [Role::HighTom, Role::HighTom, Role::MidTom, Role::MidTom, Role::FloorTom, Role::FloorTom];
        let mut out = Vec::with_capacity(lane.len());
        for (i, &role) in lane.iter().enumerate() {
            let beat = start + i as f64 * 0.25;
            let fill_role = match i {
                0 => FillRole::FillStart,
                5 => FillRole::FillEnd,
                _ => FillRole::FillBody,
            };
            out.push(
                DrumCandidate::new(self.id(), role, ctx.bar, beat, Strength::Strong)
                    .fill_role(fill_role)
                    .velocity(86 + 4 * i as u8),
            );
        }
        Ok(out)
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.3 + 0.4 * ctx.energy + 0.2 * ctx.tension)
    }
}

/// Stop-time: one choked crash plus kick on the downbeat, then silence.
pub struct StopTime;

impl DrumOperator for StopTime {
    fn id(&self) -> &'static str {
        "StopTime"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.section_boundary && ctx.is_section_last_bar() && ctx.tension >= 0.6
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Crash, ctx.bar, 1.0, Strength::Downbeat)
                .articulation(ArticulationHint::CrashChoke)
                .velocity(118),
            DrumCandidate::new(self.id(), Role::Kick, ctx.bar, 1.0, Strength::Downbeat)
                .velocity(110),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.2 + 0.6 * ctx.tension)
    }
}

/// Crash landing on the last offbeat, resolving the fill into the next bar.
pub struct FillCrashResolve;

impl DrumOperator for FillCrashResolve {
    fn id(&self) -> &'static str {
        "FillCrashResolve"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.fill_window && ctx.is_section_last_bar()
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let beat = f64::from(ctx.beats_per_bar) + 0.5;
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Crash, ctx.bar, beat, Strength::Offbeat)
                .articulation(ArticulationHint::Crash)
                .fill_role(FillRole::FillEnd)
                .velocity(108),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.45 + 0.35 * ctx.energy)
    }
}

/// Flam pickup on the final sixteenth, leaning into the next section.
pub struct PickupFlam;

impl DrumOperator for PickupFlam {
    fn id(&self) -> &'static str {
        "PickupFlam"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PhrasePunctuation
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.section_boundary && ctx.is_section_last_bar() && ctx.is_active(Role::Snare)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let beat = f64::from(ctx.beats_per_bar) + 0.75;
        Ok(vec![
            DrumCandidate::new(self.id(), Role::Snare, ctx.bar, beat, Strength::Pickup)
                .articulation(ArticulationHint::Flam)
                .fill_role(FillRole::Setup)
                .velocity(74),
        ])
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.3 + 0.25 * ctx.energy + 0.25 * ctx.tension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{ctx, fill_ctx, CtxSpec};

    fn all_ops() -> Vec<Box<dyn DrumOperator>> {
        vec![
            Box::new(CrashOnOne),
            Box::new(SetupKick),
            Box::new(SnareFill16),
            Box::new(TomRunDown),
            Box::new(StopTime),
            Box::new(FillCrashResolve),
            Box::new(PickupFlam),
        ]
    }

    #[test]
    fn mid_section_bar_silences_the_family() {
        // Bar 6 of [5, 9): not a boundary, no fill window.
        let c = ctx(CtxSpec::default());
        for op in all_ops() {
            assert!(!op.can_apply(&c), "{}", op.id());
            assert!(op.generate(&c).unwrap().is_empty(), "{}", op.id());
        }
    }

    #[test]
    fn last_bar_fill_window_arms_fill_operators() {
        let c = fill_ctx(0.7, 0.7);
        for op in all_ops() {
            if op.id() == "CrashOnOne" {
                continue; // first-bar gesture
            }
            assert!(op.can_apply(&c), "{}", op.id());
            let cands = op.generate(&c).unwrap();
            assert!(!cands.is_empty(), "{}", op.id());
            for mut cand in cands {
                cand.score = op.score(&cand, &c);
                assert_eq!(cand.validate(), Ok(()), "{}", op.id());
                assert!((0.0..=1.0).contains(&cand.score), "{}", op.id());
            }
        }
    }

    #[test]
    fn crash_on_one_fires_only_on_the_first_bar() {
        let first = ctx(CtxSpec {
            bar: 5,
            ..CtxSpec::default()
        });
        let cands = CrashOnOne.generate(&first).unwrap();
        assert_eq!(cands.len(), 2);
        assert!(cands.iter().all(|c| c.beat == 1.0));
        assert_eq!(cands[0].articulation, ArticulationHint::Crash);

        let last = ctx(CtxSpec {
            bar: 8,
            ..CtxSpec::default()
        });
        assert!(!CrashOnOne.can_apply(&last));
    }

    #[test]
    fn snare_fill_ramps_and_orders_fill_roles() {
        let c = fill_ctx(0.6, 0.5);
        let cands = SnareFill16.generate(&c).unwrap();
        assert_eq!(cands.len(), 8);
        assert_eq!(cands[0].fill_role, FillRole::FillStart);
        assert_eq!(cands[7].fill_role, FillRole::FillEnd);
        assert!(cands[1..7].iter().all(|c| c.fill_role == FillRole::FillBody));
        assert_eq!(cands[0].beat, 3.0);
        assert_eq!(cands[7].beat, 4.75);
        // Deterministic across calls despite velocity humanization.
        assert_eq!(cands, SnareFill16.generate(&c).unwrap());
    }

    #[test]
    fn tom_run_descends_through_the_kit() {
        let c = fill_ctx(0.8, 0.5);
        let cands = TomRunDown.generate(&c).unwrap();
        assert_eq!(cands.len(), 6);
        assert_eq!(cands[0].role, Role::HighTom);
        assert_eq!(cands[5].role, Role::FloorTom);
        assert_eq!(cands[5].fill_role, FillRole::FillEnd);
    }

    #[test]
    fn stop_time_needs_tension() {
        let calm = fill_ctx(0.7, 0.2);
        assert!(!StopTime.can_apply(&calm));
        let tense = fill_ctx(0.7, 0.8);
        let cands = StopTime.generate(&tense).unwrap();
        assert_eq!(cands[0].articulation, ArticulationHint::CrashChoke);
    }

    #[test]
    fn pickup_flam_sits_on_the_final_sixteenth() {
        let c = fill_ctx(0.5, 0.5);
        let cands = PickupFlam.generate(&c).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].beat, 4.75);
        assert_eq!(cands[0].id, "PickupFlam_Snare_8_4.75_Flam");
    }
}
