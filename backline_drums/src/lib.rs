// Backline Drums
//
// A deterministic drum-groove candidate engine for a procedural song
// generator. Rather than emitting finished drum parts, the engine proposes
// scored, validated onset candidates per bar and role; an external selection
// engine picks among them. All variation flows from keyed PRNG streams, so
// identical (seed, context) inputs always reproduce identical proposals.
//
// Architecture:
// - candidate.rs: Candidate value types, deterministic id derivation,
//   validation, engine-facing onset mapping
// - style.rs: Style configuration (densities, caps, feel rules) with
//   built-in rock/funk/jazz presets and JSON loading
// - context.rs: Pure per-bar context builder (phrase position, backbeats,
//   hat defaults, fill windows)
// - operators/: The 28-operator pattern library in 5 families
// - registry.rs: Append-until-frozen operator catalog with census checks
// - policy.rs: Per-bar per-role density/feel/tag overrides from style + memory
// - source.rs: The harvesting pass (generate, score, filter, group, diagnose)
// - physicality.rs: Four-limb playability filter
// - memory.rs: Windowed cross-bar memory (usage, fills, crashes, hats, ghosts)
// - error.rs: Shared error type
//
// Single-threaded per run: the frozen registry and style are shareable
// read-only; memory and RNG streams are exclusively owned.

pub mod candidate;
pub mod context;
pub mod error;
pub mod memory;
pub mod operators;
pub mod physicality;
pub mod policy;
pub mod registry;
pub mod source;
pub mod style;
