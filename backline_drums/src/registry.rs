// Operator registry: the single catalog of every generation operator.
//
// The registry is append-only until frozen, then immutable for the rest of
// the run. `build_full_registry` is the only constructor most callers need:
// it registers the complete library in family order, verifies the census
// per family, and returns the registry already frozen.

use crate::error::GrooveError;
use crate::operators::{idiom, micro, pattern, phrase, subdivision};
use crate::operators::{DrumOperator, OperatorFamily};
use crate::style::StyleConfiguration;
use rustc_hash::FxHashMap;

/// Expected census per family, in `OperatorFamily::ALL` order.
const FAMILY_CENSUS: [(OperatorFamily, usize); 5] = [
    (OperatorFamily::MicroAddition, 7),
    (OperatorFamily::SubdivisionTransform, 5),
    (OperatorFamily::PhrasePunctuation, 7),
    (OperatorFamily::PatternSubstitution, 4),
    (OperatorFamily::StyleIdiom, 5),
];

pub const TOTAL_OPERATORS: usize = 28;

pub struct OperatorRegistry {
    operators: Vec<Box<dyn DrumOperator>>,
    by_id: FxHashMap<&'static str, usize>,
    frozen: bool,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        OperatorRegistry {
            operators: Vec::new(),
            by_id: FxHashMap::default(),
            frozen: false,
        }
    }

    /// Adds one operator. Ids must be unique; registration after `freeze`
    /// is a defect.
    pub fn register(&mut self, operator: Box<dyn DrumOperator>) -> Result<(), GrooveError> {
        let id = operator.id();
        if self.frozen {
            return Err(GrooveError::RegistryFrozen { id: id.to_string() });
        }
        if self.by_id.contains_key(id) {
            return Err(GrooveError::DuplicateOperator { id: id.to_string() });
        }
        self.by_id.insert(id, self.operators.len());
        self.operators.push(operator);
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// All operators in registration order.
    pub fn all(&self) -> impl Iterator<Item = &dyn DrumOperator> {
        self.operators.iter().map(Box::as_ref)
    }

    pub fn by_family(&self, family: OperatorFamily) -> Vec<&dyn DrumOperator> {
        self.all().filter(|op| op.family() == family).collect()
    }

    /// Exact, case-sensitive id lookup.
    pub fn by_id(&self, id: &str) -> Option<&dyn DrumOperator> {
        self.by_id.get(id).map(|&i| self.operators[i].as_ref())
    }

    /// Operators permitted by a style's allow-list, in registration order.
    /// An empty allow-list means every operator is permitted.
    pub fn enabled_for<'a>(&'a self, style: &StyleConfiguration) -> Vec<&'a dyn DrumOperator> {
        if style.allowed_operators.is_empty() {
            return self.all().collect();
        }
        self.all()
            .filter(|op| style.allowed_operators.iter().any(|id| id == op.id()))
            .collect()
    }

    pub fn enabled_for_ids(&self, style: &StyleConfiguration) -> Vec<&'static str> {
        self.enabled_for(style).iter().map(|op| op.id()).collect()
    }

    fn census_breakdown(&self) -> String {
        FAMILY_CENSUS
            .iter()
            .map(|&(family, expected)| {
                format!("{}: {}/{}", family, self.by_family(family).len(), expected)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn verify_census(&self) -> Result<(), GrooveError> {
        let mismatch = FAMILY_CENSUS
            .iter()
            .any(|&(family, expected)| self.by_family(family).len() != expected);
        if mismatch || self.len() != TOTAL_OPERATORS {
            return Err(GrooveError::OperatorCensus {
                expected: TOTAL_OPERATORS,
                actual: self.len(),
                breakdown: self.census_breakdown(),
            });
        }
        Ok(())
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete operator library, family by family, frozen.
pub fn build_full_registry() -> Result<OperatorRegistry, GrooveError> {
    let mut registry = OperatorRegistry::new();

    registry.register(Box::new(micro::GhostBefore))?;
    registry.register(Box::new(micro::GhostAfter))?;
    registry.register(Box::new(micro::KickPickup))?;
    registry.register(Box::new(micro::KickDouble))?;
    registry.register(Box::new(micro::HatAccent))?;
    registry.register(Box::new(micro::SnareDrag))?;
    registry.register(Box::new(micro::TomColor))?;

    registry.register(Box::new(subdivision::HatLift))?;
    registry.register(Box::new(subdivision::HatSimplify))?;
    registry.register(Box::new(subdivision::RideSwitch))?;
    registry.register(Box::new(subdivision::HatOpenClose))?;
    registry.register(Box::new(subdivision::HalfTimeHat))?;

    registry.register(Box::new(phrase::CrashOnOne))?;
    registry.register(Box::new(phrase::SetupKick))?;
    registry.register(Box::new(phrase::SnareFill16))?;
    registry.register(Box::new(phrase::TomRunDown))?;
    registry.register(Box::new(phrase::StopTime))?;
    registry.register(Box::new(phrase::FillCrashResolve))?;
    registry.register(Box::new(phrase::PickupFlam))?;

    registry.register(Box::new(pattern::HalfTimeGroove))?;
    registry.register(Box::new(pattern::FourOnFloor))?;
    registry.register(Box::new(pattern::BreakbeatGroove))?;
    registry.register(Box::new(pattern::DoubleTimeGroove))?;

    registry.register(Box::new(idiom::RockBackbeatAccent))?;
    registry.register(Box::new(idiom::FunkGhostWeave))?;
    registry.register(Box::new(idiom::JazzRideSwing))?;
    registry.register(Box::new(idiom::DiscoOpenHat))?;
    registry.register(Box::new(idiom::MetalDoubleKick))?;

    registry.verify_census()?;
    registry.freeze();
    Ok(registry)
}
