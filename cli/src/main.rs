//! Grasp CLI - replays recorded hand input against a headless mesh.
//!
//! ```text
//! grasp replay <steps.jsonl> [--grid N]
//! ```
//!
//! Each tick:
//!
//! 1. Wait for the tick interval
//! 2. Apply the next replay step (`Session::tick` for frames)
//! 3. Print the selection summary as last reported by the worker
//!
//! After the last step the worker drains its queue, and a final summary is
//! printed with one line per selection.

mod replay;

use std::{
    env,
    fs::File,
    io::{BufReader, Write, stdout},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use grasp_config::GraspConfig;
use grasp_engine::{HeadlessEngine, Selection, Session, SessionOptions};

use replay::{ReplayStep, read_steps};

const TICK_DURATION: Duration = Duration::from_millis(11);
const DEFAULT_GRID: usize = 32;

const USAGE: &str = "usage: grasp replay <steps.jsonl> [--grid N]";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Summaries go to stdout; keep logs off it.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn selection_line(selection: &Selection) -> String {
    format!(
        "  selection {:>2}  {:>6} vertices  {}",
        selection.id.value(),
        selection.vertex_count,
        if selection.visible { "visible" } else { "hidden" }
    )
}

#[derive(Debug, PartialEq, Eq)]
struct ReplayArgs {
    path: PathBuf,
    grid: usize,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<ReplayArgs> {
    match args.next().as_deref() {
        Some("replay") => {}
        Some(other) => bail!("unknown command `{other}`\n{USAGE}"),
        None => bail!("{USAGE}"),
    }

    let mut path = None;
    let mut grid = DEFAULT_GRID;
    while let Some(arg) = args.next() {
        if arg == "--grid" {
            let value = args.next().context("--grid needs a value")?;
            grid = value
                .parse()
                .with_context(|| format!("invalid grid size `{value}`"))?;
            if grid < 2 {
                bail!("grid size must be at least 2");
            }
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            bail!("unexpected argument `{arg}`\n{USAGE}");
        }
    }

    Ok(ReplayArgs {
        path: path.context(USAGE)?,
        grid,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = parse_args(env::args().skip(1))?;
    let config = GraspConfig::load().ok().flatten().unwrap_or_default();

    let file = File::open(&args.path)
        .with_context(|| format!("opening {}", args.path.display()))?;
    let steps = read_steps(BufReader::new(file))?;
    tracing::info!(steps = steps.len(), grid = args.grid, "replay loaded");

    let engine = Arc::new(HeadlessEngine::grid(args.grid));
    let (mut session, mut worker) = Session::spawn(engine, SessionOptions::from(&config));
    let primary_override = config.primary_hand();

    let mut ticks = tokio::time::interval(TICK_DURATION);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut out = stdout().lock();
    for (index, mut step) in steps.into_iter().enumerate() {
        ticks.tick().await;
        if let (ReplayStep::Frame(frame), Some(hand)) = (&mut step, primary_override) {
            frame.shared.primary_hand = hand;
        }
        let queued = step.apply(&mut session);
        session.sync_readback();
        writeln!(
            out,
            "tick {:>4}  {}  queued {queued}  pending {}",
            index + 1,
            session.summary(),
            session.queue().len()
        )?;
    }

    let executed = worker.shutdown().await?;
    session.sync_readback();
    writeln!(out, "done: {}  executed {executed}", session.summary())?;
    for selection in session.registry().iter() {
        writeln!(out, "{}", selection_line(&selection))?;
    }
    Ok(())
}
