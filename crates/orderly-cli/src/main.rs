mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use orderly_core::{
    AppConfig, HeuristicClassifier, ItemStatus, Organizer, Outcome, Plan, PlanItem, PlanStatus,
};
use progress::CliReporter;
use tracing::{error, info};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let _guard = logging::init_logger(args.verbose);

    let config = match orderly_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match args.command {
        Some(Commands::Scan { path }) => run_scan(&config, &path),
        Some(Commands::Show { plan_id }) => run_show(&config, plan_id.as_deref()),
        Some(Commands::Approve { plan_id }) => run_approve(&config, &plan_id),
        Some(Commands::Execute { plan_id }) => run_execute(&config, &plan_id),
        Some(Commands::CountCache) => {
            info!("Counting cached classifications...");
            organizer(&config)
                .count_cache_entries()
                .map(|count| println!("{} cached classifications", count.to_string().cyan()))
                .map_err(Into::into)
        }
        Some(Commands::ClearCache) => run_clear_cache(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {}", err);
        process::exit(1);
    }
}

fn organizer(config: &AppConfig) -> Organizer {
    Organizer::new(config.clone(), Arc::new(HeuristicClassifier))
}

fn run_scan(config: &AppConfig, path: &Path) -> CliResult {
    let engine = organizer(config);
    let reporter = CliReporter::new();

    reporter.start("Planning");
    let plan = engine.create_plan(path, &reporter);
    reporter.finish();
    let plan = plan?;

    print_plan(&plan);
    println!();
    info!(
        "{} cache hits, {} bytes not read",
        reporter.cache_hits().to_string().green(),
        reporter.bytes_saved().to_string().green(),
    );
    if plan.count_by_status(ItemStatus::Pending) > 0 {
        println!(
            "Review the plan, then run: orderly approve {}",
            plan.id.bold()
        );
    }
    Ok(())
}

fn run_show(config: &AppConfig, plan_id: Option<&str>) -> CliResult {
    let engine = organizer(config);
    match plan_id {
        Some(id) => print_plan(&engine.get_plan(id)?),
        None => {
            let plans = engine.list_plans(0, 20)?;
            if plans.is_empty() {
                println!("No plans yet");
            }
            for p in plans {
                println!(
                    "{}  {:<8}  {:>5} items  {}  {}",
                    p.id,
                    colored_plan_status(p.status),
                    p.item_count,
                    p.created_at.dimmed(),
                    p.root_dir
                );
            }
        }
    }
    Ok(())
}

fn run_approve(config: &AppConfig, plan_id: &str) -> CliResult {
    match organizer(config).approve_plan(plan_id)? {
        PlanStatus::Approved => println!("Plan {} approved", plan_id.bold()),
        other => println!(
            "Plan {} is {}; nothing to approve",
            plan_id.bold(),
            colored_plan_status(other)
        ),
    }
    Ok(())
}

fn run_execute(config: &AppConfig, plan_id: &str) -> CliResult {
    let engine = organizer(config);
    let reporter = CliReporter::new();

    reporter.start("Executing");
    let report = engine.execute_plan(plan_id, &reporter);
    reporter.finish();
    let report = report?;

    for o in &report.outcomes {
        let label = match &o.outcome {
            Outcome::Moved | Outcome::Recovered => o.outcome.to_string().green(),
            Outcome::Failed(_) | Outcome::PreviouslyFailed(_) => o.outcome.to_string().red(),
            _ => o.outcome.to_string().dimmed(),
        };
        println!("  {} -> {}: {}", o.src_path, o.dest_path, label);
    }

    println!();
    info!(
        "Plan {} {} in {}: {} moved, {} recovered, {} failed",
        report.plan_id,
        colored_plan_status(report.status),
        format!("{:.2}s", report.duration.as_secs_f64()).green(),
        report.count(|o| *o == Outcome::Moved).to_string().green(),
        report.count(|o| *o == Outcome::Recovered).to_string().cyan(),
        report
            .count(|o| matches!(o, Outcome::Failed(_)))
            .to_string()
            .red(),
    );
    Ok(())
}

fn run_clear_cache(config: &AppConfig) -> CliResult {
    if !prompt_confirm("Remove ALL cached classifications?", Some(false))? {
        return Ok(());
    }
    let removed = organizer(config).clear_cache()?;
    println!("{} cache entries removed", removed);
    Ok(())
}

fn print_plan(plan: &Plan) {
    println!(
        "Plan {} ({}) for {}",
        plan.id.bold(),
        colored_plan_status(plan.status),
        plan.root_dir
    );
    for item in &plan.items {
        print_item(item);
    }
    println!(
        "{} pending, {} done, {} skipped, {} errors",
        plan.count_by_status(ItemStatus::Pending).to_string().yellow(),
        plan.count_by_status(ItemStatus::Done).to_string().green(),
        plan.count_by_status(ItemStatus::Skipped),
        plan.count_by_status(ItemStatus::Error).to_string().red(),
    );
}

fn print_item(item: &PlanItem) {
    let status = match item.status {
        ItemStatus::Pending => item.status.as_str().yellow(),
        ItemStatus::Done => item.status.as_str().green(),
        ItemStatus::Skipped => item.status.as_str().dimmed(),
        ItemStatus::Error => item.status.as_str().red(),
    };
    if item.src_path == item.dest_path {
        println!("  {:<8} {}", status, item.src_path);
    } else {
        println!("  {:<8} {} -> {}", status, item.src_path, item.dest_path);
    }
    println!("           {}", item.reasoning.dimmed());
    if let Some(msg) = &item.error_msg {
        println!("           {}", msg.red());
    }
}

fn colored_plan_status(status: PlanStatus) -> ColoredString {
    match status {
        PlanStatus::Created => status.as_str().yellow(),
        PlanStatus::Approved => status.as_str().cyan(),
        PlanStatus::Executed => status.as_str().green(),
        PlanStatus::Failed => status.as_str().red(),
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
