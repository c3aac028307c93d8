// SubdivisionTransform family: whole-bar changes to the hat/ride pulse
// grid. Each operator emits the complete replacement pulse for the bar; the
// selection engine treats the set as one gesture. Gates are phrased so that
// opposing transforms (lift vs simplify) can never both apply to one bar.

use crate::candidate::{ArticulationHint, DrumCandidate, Role, Strength};
use crate::context::DrummerContext;
use crate::operators::{clamp01, offbeats, quarter_beats, DrumOperator, OperatorError, OperatorFamily};
use crate::style::{HatMode, SectionType, Subdivision};

fn pulse_strength(beat: f64) -> Strength {
    if beat.fract() == 0.0 {
        if beat == 1.0 { Strength::Downbeat } else { Strength::Strong }
    } else if beat.fract() == 0.5 {
        Strength::Offbeat
    } else {
        Strength::Ghost
    }
}

fn sixteenth_grid(beats_per_bar: u8) -> Vec<f64> {
    let mut beats = Vec::with_capacity(beats_per_bar as usize * 4);
    for b in 1..=beats_per_bar {
        for step in 0..4 {
            beats.push(f64::from(b) + f64::from(step) * 0.25);
        }
    }
    beats
}

fn eighth_grid(beats_per_bar: u8) -> Vec<f64> {
    let mut beats = Vec::with_capacity(beats_per_bar as usize * 2);
    for b in 1..=beats_per_bar {
        beats.push(f64::from(b));
        beats.push(f64::from(b) + 0.5);
    }
    beats
}

fn pulse_candidates(
    operator: &str,
    role: Role,
    ctx: &DrummerContext,
    beats: &[f64],
    articulation: ArticulationHint,
    velocity: u8,
) -> Vec<DrumCandidate> {
    beats
        .iter()
        .map(|&beat| {
            let c = DrumCandidate::new(operator, role, ctx.bar, beat, pulse_strength(beat))
                .velocity(velocity);
            if articulation == ArticulationHint::None {
                c
            } else {
                c.articulation(articulation)
            }
        })
        .collect()
}

/// Lift the hat from eighths to sixteenths when the energy asks for it.
pub struct HatLift;

impl DrumOperator for HatLift {
    fn id(&self) -> &'static str {
        "HatLift"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::SubdivisionTransform
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.hat_subdivision == Subdivision::Eighth
            && ctx.hat_mode == HatMode::Closed
            && ctx.energy >= 0.6
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(pulse_candidates(
            self.id(),
            Role::ClosedHat,
            ctx,
            &sixteenth_grid(ctx.beats_per_bar),
            ArticulationHint::None,
            64,
        ))
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.2 + 0.6 * ctx.energy)
    }
}

/// Drop the hat from sixteenths back to eighths when the energy falls away.
pub struct HatSimplify;

impl DrumOperator for HatSimplify {
    fn id(&self) -> &'static str {
        "HatSimplify"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::SubdivisionTransform
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.hat_subdivision == Subdivision::Sixteenth && ctx.energy <= 0.35
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(pulse_candidates(
            self.id(),
            Role::ClosedHat,
            ctx,
            &eighth_grid(ctx.beats_per_bar),
            ArticulationHint::None,
            58,
        ))
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.8 - 0.6 * ctx.energy)
    }
}

/// Move the pulse from closed hat to the ride.
pub struct RideSwitch;

impl DrumOperator for RideSwitch {
    fn id(&self) -> &'static str {
        "RideSwitch"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::SubdivisionTransform
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.hat_mode == HatMode::Closed
            && ctx.hat_subdivision != Subdivision::None
            && (ctx.energy >= 0.7 || ctx.section == SectionType::Chorus)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(pulse_candidates(
            self.id(),
            Role::Ride,
            ctx,
            &eighth_grid(ctx.beats_per_bar),
            ArticulationHint::Ride,
            72,
        ))
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        let chorus_bonus = if ctx.section == SectionType::Chorus { 0.2 } else { 0.0 };
        clamp01(0.2 + 0.5 * ctx.energy + chorus_bonus)
    }
}

/// Alternate closed/open eighths: closed on the beat, open on the "and".
pub struct HatOpenClose;

impl DrumOperator for HatOpenClose {
    fn id(&self) -> &'static str {
        "HatOpenClose"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::SubdivisionTransform
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        ctx.hat_subdivision == Subdivision::Eighth
            && ctx.hat_mode == HatMode::Closed
            && (0.4..0.8).contains(&ctx.energy)
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        let mut out = pulse_candidates(
            self.id(),
            Role::ClosedHat,
            ctx,
            &quarter_beats(ctx.beats_per_bar),
            ArticulationHint::None,
            66,
        );
        out.extend(pulse_candidates(
            self.id(),
            Role::ClosedHat,
            ctx,
            &offbeats(ctx.beats_per_bar),
            ArticulationHint::OpenHat,
            80,
        ));
        out.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        Ok(out)
    }

    fn score(&self, candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        // The open "and"s are the point of the gesture.
        let open_bonus = if candidate.articulation == ArticulationHint::OpenHat { 0.1 } else { 0.0 };
        clamp01(0.3 + 0.4 * ctx.energy + open_bonus)
    }
}

/// Thin the hat to bare quarters for low-energy passages.
pub struct HalfTimeHat;

impl DrumOperator for HalfTimeHat {
    fn id(&self) -> &'static str {
        "HalfTimeHat"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::SubdivisionTransform
    }

    fn can_apply(&self, ctx: &DrummerContext) -> bool {
        matches!(ctx.hat_subdivision, Subdivision::Eighth | Subdivision::Sixteenth)
            && ctx.energy <= 0.25
    }

    fn generate(&self, ctx: &DrummerContext) -> Result<Vec<DrumCandidate>, OperatorError> {
        if !self.can_apply(ctx) {
            return Ok(Vec::new());
        }
        Ok(pulse_candidates(
            self.id(),
            Role::ClosedHat,
            ctx,
            &quarter_beats(ctx.beats_per_bar),
            ArticulationHint::None,
            54,
        ))
    }

    fn score(&self, _candidate: &DrumCandidate, ctx: &DrummerContext) -> f64 {
        clamp01(0.7 - 0.5 * ctx.energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testutil::{ctx, CtxSpec};

    #[test]
    fn hat_lift_emits_a_full_sixteenth_bar() {
        let c = ctx(CtxSpec {
            energy: 0.7,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        let cands = HatLift.generate(&c).unwrap();
        assert_eq!(cands.len(), 16);
        assert_eq!(cands.first().unwrap().beat, 1.0);
        assert_eq!(cands.last().unwrap().beat, 4.75);
        assert!(cands.iter().all(|c| c.role == Role::ClosedHat));
        for cand in &cands {
            assert_eq!(cand.validate(), Ok(()));
        }
    }

    #[test]
    fn lift_and_simplify_are_mutually_exclusive() {
        for energy in [0.0, 0.2, 0.35, 0.5, 0.6, 0.8, 1.0] {
            for sub in [Subdivision::Eighth, Subdivision::Sixteenth] {
                let c = ctx(CtxSpec {
                    energy,
                    hat: Some((HatMode::Closed, sub)),
                    ..CtxSpec::default()
                });
                assert!(
                    !(HatLift.can_apply(&c) && HatSimplify.can_apply(&c)),
                    "energy {energy}, sub {sub:?}"
                );
            }
        }
    }

    #[test]
    fn ride_switch_gated_by_mode_and_energy_or_chorus() {
        let chorus = ctx(CtxSpec {
            section: SectionType::Chorus,
            energy: 0.5,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        assert!(RideSwitch.can_apply(&chorus));
        let cands = RideSwitch.generate(&chorus).unwrap();
        assert!(cands.iter().all(|c| c.role == Role::Ride));
        assert!(cands.iter().all(|c| c.articulation == ArticulationHint::Ride));

        let already_ride = ctx(CtxSpec {
            section: SectionType::Chorus,
            energy: 0.9,
            hat: Some((HatMode::Ride, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        assert!(!RideSwitch.can_apply(&already_ride));
        assert!(RideSwitch.generate(&already_ride).unwrap().is_empty());
    }

    #[test]
    fn open_close_alternates_articulation() {
        let c = ctx(CtxSpec {
            energy: 0.5,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        let cands = HatOpenClose.generate(&c).unwrap();
        assert_eq!(cands.len(), 8);
        for cand in &cands {
            if cand.beat.fract() == 0.0 {
                assert_eq!(cand.articulation, ArticulationHint::None);
            } else {
                assert_eq!(cand.articulation, ArticulationHint::OpenHat);
            }
        }
        // Open offbeats outscore closed quarters.
        assert!(
            HatOpenClose.score(&cands[1], &c) > HatOpenClose.score(&cands[0], &c)
        );
    }

    #[test]
    fn half_time_hat_only_at_low_energy() {
        let low = ctx(CtxSpec {
            energy: 0.2,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        let cands = HalfTimeHat.generate(&low).unwrap();
        assert_eq!(cands.len(), 4);
        assert!(cands.iter().all(|c| c.beat.fract() == 0.0));

        let high = ctx(CtxSpec {
            energy: 0.6,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        assert!(HalfTimeHat.generate(&high).unwrap().is_empty());
    }

    #[test]
    fn generation_is_deterministic() {
        let c = ctx(CtxSpec {
            energy: 0.7,
            hat: Some((HatMode::Closed, Subdivision::Eighth)),
            ..CtxSpec::default()
        });
        assert_eq!(HatLift.generate(&c).unwrap(), HatLift.generate(&c).unwrap());
        assert_eq!(
            RideSwitch.generate(&c).unwrap(),
            RideSwitch.generate(&c).unwrap()
        );
    }
}
