use circuit_core::*;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "circuit")]
#[command(about = "Circuit workout session timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workout session
    Run {
        /// Built-in plan id (see `circuit plans`)
        plan: Option<String>,

        /// Load the plan from a TOML file instead
        #[arg(long, conflicts_with = "plan")]
        file: Option<PathBuf>,

        /// Stream simulated heart-rate readings
        #[arg(long)]
        simulate_hr: bool,

        /// Advance through every step without waiting for input (for testing)
        #[arg(long)]
        auto: bool,

        /// With --auto: finish early and save after this many steps
        #[arg(long, requires = "auto", conflicts_with = "dismiss")]
        stop_after: Option<usize>,

        /// With --auto: dismiss without saving after the first step
        /// (straight away for plans with fewer than two steps)
        #[arg(long, requires = "auto")]
        dismiss: bool,
    },

    /// List built-in plans (default)
    Plans,

    /// Show recent workouts
    History {
        /// Number of workouts to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show progress statistics
    Stats,

    /// Export history to CSV
    Export {
        /// Destination CSV file
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    circuit_core::logging::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data.data_dir = data_dir;
    }
    let history_path = config.data.history_path();
    tracing::debug!("Using history file {:?}", history_path);

    match cli.command {
        Some(Commands::Run {
            plan,
            file,
            simulate_hr,
            auto,
            stop_after,
            dismiss,
        }) => {
            let plan = resolve_plan(plan.as_deref(), file.as_deref())?;
            let mode = if !auto {
                RunMode::Interactive
            } else if dismiss {
                RunMode::AutoDismiss
            } else {
                RunMode::Auto { stop_after }
            };
            cmd_run(&plan, &history_path, &config, simulate_hr, mode).await
        }
        Some(Commands::History { limit }) => cmd_history(&history_path, limit),
        Some(Commands::Stats) => cmd_stats(&history_path),
        Some(Commands::Export { output }) => cmd_export(&history_path, &output),
        Some(Commands::Plans) | None => {
            cmd_plans();
            Ok(())
        }
    }
}

enum RunMode {
    Interactive,
    Auto { stop_after: Option<usize> },
    AutoDismiss,
}

/// Reports session errors on the terminal
struct StderrErrorSink;

impl ErrorSink for StderrErrorSink {
    fn report(&self, message: &str) {
        eprintln!("✗ {}", message);
    }
}

fn resolve_plan(id: Option<&str>, file: Option<&Path>) -> Result<WorkoutPlan> {
    match (id, file) {
        (_, Some(path)) => WorkoutPlan::load_from(path),
        (Some(id), None) => find_plan(id).cloned().ok_or_else(|| {
            eprintln!("Unknown plan: {}. Run `circuit plans` to list built-in plans.", id);
            Error::PlanValidation(format!("unknown plan '{}'", id))
        }),
        (None, None) => {
            eprintln!("Specify a plan id or --file <plan.toml>.");
            Err(Error::Other("no plan given".into()))
        }
    }
}

async fn cmd_run(
    plan: &WorkoutPlan,
    history_path: &Path,
    config: &Config,
    simulate_hr: bool,
    mode: RunMode,
) -> Result<()> {
    display_plan(plan);

    let metrics: Box<dyn MetricsSource> = if simulate_hr {
        Box::new(SimulatedHeartRate::new(Duration::from_secs(1)))
    } else {
        Box::new(NoMetrics)
    };

    let session = WorkoutSession::new(
        plan,
        Collaborators {
            persistence: Box::new(JsonlHistory::new(history_path)),
            metrics,
            entitlement: Box::new(StaticEntitlement(config.subscription.premium)),
            errors: Box::new(StderrErrorSink),
        },
        Arc::new(SystemClock),
        SessionOptions::from(config),
    );

    let handle = spawn_session(session, RunnerOptions::from(config));
    handle.start().await?;

    let mut display = None;
    match mode {
        RunMode::Interactive => {
            print_controls();
            display = Some(tokio::spawn(display_progress(handle.subscribe())));
            let controller = handle.controller();
            std::thread::spawn(move || read_commands(controller));
        }
        RunMode::Auto { stop_after } => auto_drive(&handle, stop_after, simulate_hr).await?,
        RunMode::AutoDismiss => {
            // Advancing the only step would complete and save the workout
            if plan.steps.len() > 1 {
                handle.advance().await?;
            }
            handle.end_early().await?;
        }
    }

    let outcome = handle.finished().await?;
    if let Some(display) = display {
        let _ = display.await;
    }

    display_outcome(&outcome);
    Ok(())
}

/// Advance through the plan as fast as the session accepts commands
///
/// Each advance waits for the resulting snapshot, so every step and round
/// is printed in order. With `wait_for_heart_rate` the first step is held
/// until a reading has arrived.
async fn auto_drive(
    handle: &SessionHandle,
    stop_after: Option<usize>,
    wait_for_heart_rate: bool,
) -> Result<()> {
    let mut snapshots = handle.subscribe();
    let mut snapshot = snapshots
        .wait_for(|s| {
            s.phase.is_terminal()
                || (s.phase != SessionPhase::NotStarted
                    && (!wait_for_heart_rate || s.heart_rate_bpm.is_some()))
        })
        .await
        .map_err(|_| Error::SessionClosed)?
        .clone();
    if snapshot.phase.is_terminal() {
        return Ok(());
    }
    print_step(&snapshot, None);

    let mut advances = 0;
    loop {
        if stop_after.is_some_and(|limit| advances >= limit) {
            handle.complete(true).await?;
            return Ok(());
        }

        let round = snapshot.current_round;
        handle.advance().await?;
        advances += 1;

        snapshot = snapshots
            .wait_for(|s| s.splits_recorded >= advances || s.phase.is_terminal())
            .await
            .map_err(|_| Error::SessionClosed)?
            .clone();
        if snapshot.phase.is_terminal() {
            return Ok(());
        }
        print_step(&snapshot, Some(round));
    }
}

/// Map stdin lines to session commands until input closes
fn read_commands(controller: SessionController) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let command = match line.trim().to_lowercase().as_str() {
            "" => SessionCommand::Advance,
            "p" => SessionCommand::TogglePause,
            "f" => SessionCommand::Complete { early: true },
            "q" => SessionCommand::EndEarly,
            other => {
                eprintln!("Unknown input '{}'", other);
                continue;
            }
        };
        if controller.send_blocking(command).is_err() {
            break;
        }
    }
}

/// Print a line whenever the step, round or phase changes
async fn display_progress(mut snapshots: tokio::sync::watch::Receiver<SessionSnapshot>) {
    let mut last: Option<(SessionPhase, usize, u32)> = None;
    let mut last_zone: Option<HeartRateZone> = None;

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        let key = (snapshot.phase, snapshot.step_index, snapshot.current_round);

        if last != Some(key) {
            let previous = last.map(|(phase, _, round)| (phase, round));
            match snapshot.phase {
                SessionPhase::Running => {
                    if previous == Some((SessionPhase::Paused, snapshot.current_round)) {
                        println!("  ▶ Resumed");
                    } else {
                        print_step(&snapshot, previous.map(|(_, round)| round));
                    }
                }
                SessionPhase::Paused => println!(
                    "  ⏸ Paused at {}",
                    format_elapsed(snapshot.elapsed_seconds)
                ),
                _ => {}
            }
            last = Some(key);
        }

        if snapshot.heart_rate_zone != last_zone {
            if let (Some(bpm), Some(zone)) = (snapshot.heart_rate_bpm, snapshot.heart_rate_zone) {
                println!("  ♥ {:.0} bpm, {}", bpm, zone.label());
            }
            last_zone = snapshot.heart_rate_zone;
        }
    }
}

fn print_step(snapshot: &SessionSnapshot, previous_round: Option<u32>) {
    if snapshot.total_rounds > 1 && previous_round != Some(snapshot.current_round) {
        println!(
            "── Round {}/{} ──",
            snapshot.current_round, snapshot.total_rounds
        );
    }
    match &snapshot.step_name {
        Some(name) => println!(
            "  → [{}/{}] {} ({})",
            snapshot.step_index + 1,
            snapshot.total_steps,
            name,
            format_elapsed(snapshot.elapsed_seconds)
        ),
        None => println!("  → Timer running"),
    }
}

fn print_controls() {
    println!("─────────────────────────────────────────");
    println!("Enter to finish the current step");
    println!("  'p' + Enter to pause/resume");
    println!("  'f' + Enter to finish early and save");
    println!("  'q' + Enter to quit without saving");
    println!();
}

fn display_plan(plan: &WorkoutPlan) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", plan.name);
    println!("╰─────────────────────────────────────────╯");
    if plan.steps.is_empty() {
        println!("  Open session (no steps)");
    }
    for (i, step) in plan.ordered_steps().iter().enumerate() {
        println!("  {}. {}", i + 1, step.name);
    }
    if plan.total_rounds() > 1 {
        println!("  × {} rounds", plan.total_rounds());
    }
    println!();
}

fn display_outcome(outcome: &SessionOutcome) {
    println!();
    match outcome {
        SessionOutcome::Saved(record) => {
            println!(
                "✓ Workout saved! {} in {} ({} splits)",
                record.plan_name,
                format_elapsed(record.duration_minutes * 60.0),
                record.splits.len()
            );
            if let Some(hr) = &record.heart_rate {
                println!(
                    "  Heart rate: avg {:.0}, max {:.0} bpm",
                    hr.average_bpm, hr.max_bpm
                );
            }
        }
        SessionOutcome::SaveFailed { .. } => {
            println!("Workout finished, but it could not be saved.");
        }
        SessionOutcome::Discarded => {
            println!("Workout ended without saving.");
        }
    }
}

fn cmd_plans() {
    println!("Built-in plans:");
    for plan in get_default_catalog() {
        let rounds = if plan.total_rounds() > 1 {
            format!(", {} rounds", plan.total_rounds())
        } else {
            String::new()
        };
        println!(
            "  {:<20} {} ({} steps{})",
            plan.id,
            plan.name,
            plan.steps.len(),
            rounds
        );
    }
}

fn cmd_history(history_path: &Path, limit: usize) -> Result<()> {
    let records = read_history(history_path)?;
    if records.is_empty() {
        println!("No workouts recorded yet.");
        return Ok(());
    }

    println!("Recent workouts:");
    for record in circuit_core::history::recent(&records, limit) {
        let flag = if record.early { " (ended early)" } else { "" };
        println!(
            "  {}  {:<20} {:>8}  {} splits{}",
            record.completed_at.format("%Y-%m-%d %H:%M"),
            record.plan_name,
            format_elapsed(record.duration_minutes * 60.0),
            record.splits.len(),
            flag
        );
    }
    Ok(())
}

fn cmd_stats(history_path: &Path) -> Result<()> {
    let records = read_history(history_path)?;
    let stats = summarize(&records, chrono::Utc::now().date_naive());

    println!("Total workouts: {}", stats.total_workouts);
    println!(
        "  Completed: {}  Ended early: {}",
        stats.completed, stats.ended_early
    );
    println!("Total time: {:.1} min", stats.total_minutes);
    println!("Average: {:.1} min", stats.average_minutes);
    println!("Last 7 days: {}", stats.last_7_days);
    println!(
        "Streak: {} days (longest {})",
        stats.current_streak_days, stats.longest_streak_days
    );
    if !stats.best_minutes_by_plan.is_empty() {
        println!("Best times:");
        for (plan_id, minutes) in &stats.best_minutes_by_plan {
            println!("  {:<20} {}", plan_id, format_elapsed(minutes * 60.0));
        }
    }
    Ok(())
}

fn cmd_export(history_path: &Path, output: &Path) -> Result<()> {
    let records = read_history(history_path)?;
    let count = export_csv(&records, output)?;
    println!("✓ Exported {} workouts", count);
    println!("  CSV: {}", output.display());
    Ok(())
}

fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
