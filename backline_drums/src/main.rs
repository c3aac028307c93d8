// Backline Drums demo driver.
//
// Plans a small section list, then per bar and role runs the full candidate
// pipeline (context -> policy -> operators -> physicality -> a minimal
// greedy selection stand-in) and feeds the decisions back into agent
// memory. The real song generator replaces the greedy step with its own
// selection engine; this binary exists to exercise the pipeline end to end
// and show its output.
//
// Usage:
//   cargo run -p backline_drums --bin generate -- [--seed N] [--style NAME]
//     [--bars N] [--verbose]
//
// Styles: rock, funk, jazz

use backline_drums::candidate::{ArticulationHint, FillRole, OnsetCandidate, Role, Strength};
use backline_drums::context::{
    build_context, BarInfo, ContextInput, FillPolicy, SectionInfo,
};
use backline_drums::error::GrooveError;
use backline_drums::memory::{AgentMemory, FillShape};
use backline_drums::physicality::PhysicalityFilter;
use backline_drums::policy::PolicyProvider;
use backline_drums::registry::build_full_registry;
use backline_drums::source::CandidateSource;
use backline_drums::style::{SectionType, StyleConfiguration};
use std::collections::BTreeMap;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let seed: u64 = parse_flag(&args, "--seed").unwrap_or(42);
    let style_name: String = parse_flag(&args, "--style").unwrap_or_else(|| "rock".to_string());
    let total_bars: u32 = parse_flag(&args, "--bars").unwrap_or(16);
    let verbose = args.iter().any(|a| a == "--verbose");

    if verbose {
        use tracing_subscriber::EnvFilter;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
    }

    if let Err(e) = run(seed, &style_name, total_bars) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(seed: u64, style_name: &str, total_bars: u32) -> Result<(), GrooveError> {
    println!("=== Backline Drums ===");
    println!("Seed: {}", seed);
    println!("Style: {}", style_name);
    println!("Bars: {}", total_bars);
    println!();

    println!("[1/4] Building operator registry...");
    let registry = build_full_registry()?;
    println!("  {} operators registered and frozen.", registry.len());

    println!("[2/4] Loading style '{}'...", style_name);
    let style = style_by_name(style_name);
    println!(
        "  {} section densities, {} role caps, min fill spacing {} bars.",
        style.section_density.len(),
        style.role_caps.len(),
        style.min_fill_spacing_bars
    );

    let sections = plan_sections(total_bars);
    println!("[3/4] Generating {} bars in {} sections...", total_bars, sections.len());

    let provider = PolicyProvider::new(&style);
    let source = CandidateSource::new(&registry, &style)
        .with_physicality(PhysicalityFilter::default());
    let mut memory = AgentMemory::default();

    // Per section type: (bars, selected onsets).
    let mut summary: BTreeMap<SectionType, (u32, usize)> = BTreeMap::new();

    let mut start_bar = 1;
    for (section, length_bars) in &sections {
        let (section, length_bars) = (*section, *length_bars);
        println!(
            "  [bars {}-{}] {:?}",
            start_bar,
            start_bar + length_bars - 1,
            section
        );

        for bar in start_bar..start_bar + length_bars {
            let bar_within = bar - start_bar;
            let energy = section_energy(section);
            let tension = f64::from(bar_within) / f64::from(length_bars) * 0.6;

            let mut bar_selected: Vec<OnsetCandidate> = Vec::new();
            for role in [Role::Kick, Role::Snare, Role::ClosedHat] {
                let ctx = build_context(&ContextInput {
                    bar: BarInfo {
                        bar,
                        beats_per_bar: 4,
                        energy,
                        tension,
                        motif_presence: 0.0,
                    },
                    section: SectionInfo {
                        section,
                        start_bar,
                        length_bars,
                    },
                    fill_policy: Some(FillPolicy { window_bars: 1 }),
                    role,
                    style: style.name.clone(),
                    seed,
                    overrides: None,
                });

                let policy = provider.get_policy(&ctx, role, &memory);
                let harvest = source.candidate_groups(&ctx, &policy, &memory)?;

                let budget = policy
                    .max_events_per_bar
                    .map(usize::from)
                    .unwrap_or_else(|| {
                        (policy.density.unwrap_or(0.5) * 8.0).round() as usize
                    });
                let selected = greedy_select(harvest.groups, budget);

                for onset in &selected {
                    for tag in &onset.tags {
                        if let Some(op) = tag.strip_prefix("op:") {
                            memory.record_decision(bar, op);
                        }
                    }
                    if matches!(
                        onset.articulation,
                        ArticulationHint::Crash | ArticulationHint::CrashChoke
                    ) {
                        memory.record_crash_hit(onset.beat, section);
                    }
                }
                bar_selected.extend(selected);
            }

            let ghosts = bar_selected
                .iter()
                .filter(|o| o.strength == Strength::Ghost)
                .count() as u32;
            memory.record_ghost_notes(bar, ghosts);

            let fill_onsets: Vec<&OnsetCandidate> = bar_selected
                .iter()
                .filter(|o| o.fill_role != FillRole::None)
                .collect();
            if !fill_onsets.is_empty() {
                let shape = FillShape {
                    bar_in_section: bar_within + 1,
                    roles: fill_onsets.iter().map(|o| o.role).collect(),
                    density: (fill_onsets.len() as f64 / 16.0).min(1.0),
                    duration_bars: 1,
                    tag: None,
                };
                if memory.would_repeat_previous_section_fill(&shape) {
                    println!("    bar {}: fill repeats the previous section's.", bar);
                }
                memory.record_fill(bar, shape, section);
            }

            let entry = summary.entry(section).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += bar_selected.len();
        }

        start_bar += length_bars;
    }

    println!("[4/4] Summary:");
    for (section, (bars, onsets)) in &summary {
        println!(
            "  {:?}: {} bars, {} onsets ({:.1}/bar)",
            section,
            bars,
            onsets,
            *onsets as f64 / f64::from(*bars)
        );
    }
    let snapshot = memory.snapshot();
    println!("  Memory: {}", serde_json::to_string(&snapshot)?);

    Ok(())
}

/// Keep the highest-bias onsets within the budget, then restore beat order.
fn greedy_select(
    groups: Vec<(backline_drums::operators::OperatorFamily, Vec<OnsetCandidate>)>,
    budget: usize,
) -> Vec<OnsetCandidate> {
    let mut onsets: Vec<OnsetCandidate> =
        groups.into_iter().flat_map(|(_, group)| group).collect();
    onsets.sort_by(|a, b| {
        b.probability_bias
            .total_cmp(&a.probability_bias)
            .then(a.beat.total_cmp(&b.beat))
    });
    onsets.truncate(budget.max(1));
    onsets.sort_by(|a, b| a.beat.total_cmp(&b.beat));
    onsets
}

fn style_by_name(name: &str) -> StyleConfiguration {
    match name.to_lowercase().as_str() {
        "rock" => StyleConfiguration::rock(),
        "funk" => StyleConfiguration::funk(),
        "jazz" => StyleConfiguration::jazz(),
        _ => {
            eprintln!("Unknown style '{}'. Using rock.", name);
            StyleConfiguration::rock()
        }
    }
}

fn section_energy(section: SectionType) -> f64 {
    match section {
        SectionType::Intro => 0.3,
        SectionType::Verse => 0.5,
        SectionType::PreChorus => 0.65,
        SectionType::Chorus => 0.85,
        SectionType::Bridge => 0.4,
        SectionType::Outro => 0.3,
    }
}

/// Tile a simple song template until the requested length is covered.
fn plan_sections(total_bars: u32) -> Vec<(SectionType, u32)> {
    let template = [
        (SectionType::Intro, 2),
        (SectionType::Verse, 4),
        (SectionType::Chorus, 4),
        (SectionType::Verse, 4),
        (SectionType::Chorus, 4),
        (SectionType::Outro, 2),
    ];
    let mut sections = Vec::new();
    let mut remaining = total_bars.max(1);
    'outer: loop {
        for (section, len) in template {
            let len = len.min(remaining);
            sections.push((section, len));
            remaining -= len;
            if remaining == 0 {
                break 'outer;
            }
        }
    }
    sections
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
