//! Policylog - command line policy decision point
//!
//! Loads a policy file, then prints it, lists its rules, runs goals
//! against it or decides a data flow.
//!
//! ## Usage
//!
//! ```bash
//! # Decide a flow
//! policylog policy.pl --from camel --to hadoop --label personal
//!
//! # All solutions of an ad hoc goal
//! policylog policy.pl --goal "has_target(R, S)" --all
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use policylog::{DecisionRequest, PdpConfig, PolicyDecisionPoint, QueryBudget};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Logic-rule policy decision point
#[derive(Parser, Debug)]
#[command(name = "policylog")]
#[command(version)]
#[command(about = "Decide data flows against a logic policy", long_about = None)]
struct Args {
    /// Policy file to load
    policy: PathBuf,

    /// JSON settings for the decision point
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the loaded policy
    #[arg(long)]
    print: bool,

    /// List rule identifiers
    #[arg(long)]
    rules: bool,

    /// Goal to run, e.g. "rule(X)"; may be repeated
    #[arg(short, long)]
    goal: Vec<String>,

    /// Report every solution instead of the first
    #[arg(long)]
    all: bool,

    /// Stop a goal after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Sending service of the flow to decide
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Receiving service of the flow to decide
    #[arg(long)]
    to: Option<String>,

    /// Label of the data in the flow; may be repeated
    #[arg(short, long)]
    label: Vec<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[cfg(feature = "serde")]
fn read_config(path: &Path) -> Result<PdpConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(PdpConfig::from_json(&text)?)
}

#[cfg(not(feature = "serde"))]
fn read_config(path: &Path) -> Result<PdpConfig> {
    anyhow::bail!(
        "cannot read {}: built without the serde feature",
        path.display()
    )
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => PdpConfig::default(),
    };
    let pdp = PolicyDecisionPoint::with_config(config);

    let file = File::open(&args.policy)
        .with_context(|| format!("opening policy {}", args.policy.display()))?;
    let count = pdp
        .load_policy_reader(BufReader::new(file))
        .with_context(|| format!("loading policy {}", args.policy.display()))?;
    info!("{} clauses from {}", count, args.policy.display());

    let mut did_something = false;

    if args.print {
        print!("{}", pdp.get_policy());
        did_something = true;
    }

    if args.rules {
        for rule in pdp.list_rules()? {
            println!("{rule}");
        }
        did_something = true;
    }

    let mut budget = config.engine.budget;
    if let Some(ms) = args.timeout_ms {
        budget = budget.with_timeout(Duration::from_millis(ms));
    }
    for goal in &args.goal {
        run_goal(&pdp, goal, args.all, &budget)?;
        did_something = true;
    }

    if let Some(to) = args.to {
        let request = DecisionRequest::new(args.from.unwrap_or_default(), to, args.label);
        let decision = pdp.request_decision(&request);
        match decision.obligation {
            Some(obligation) => println!("{} ({obligation}): {}", decision.decision, decision.reason),
            None => println!("{}: {}", decision.decision, decision.reason),
        }
        did_something = true;
    }

    if !did_something {
        println!("{count} clauses loaded");
    }
    Ok(())
}

fn run_goal(pdp: &PolicyDecisionPoint, goal: &str, all: bool, budget: &QueryBudget) -> Result<()> {
    let solutions = pdp
        .engine()
        .query_with_budget(goal, all, budget)
        .with_context(|| format!("running {goal}"))?;
    if solutions.is_empty() {
        println!("false.");
    }
    for solution in &solutions {
        println!("{solution}.");
    }
    Ok(())
}
