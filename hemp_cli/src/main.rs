use clap::{Args, Parser, Subcommand};
use hemp_core::export::{write_csv_tables, write_json_report, REPORT_FILE};
use hemp_core::process::{hemp_pipeline, FEED};
use hemp_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hempflow")]
#[command(about = "Mass balance simulation of hemp biomass fractionation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a configuration file (defaults to the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation and print the report (default)
    Run(RunArgs),

    /// List the configured stages
    Stages,

    /// Print one component of a final stream or loss
    Query {
        /// Stream or loss name, e.g. "Cream Product"
        stream: String,

        /// Component name, e.g. CBD
        component: String,
    },

    /// Print the default configuration as TOML
    Defaults,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Write CSV tables and report.json (to the configured output dir if none given)
    #[arg(long, num_args = 0..=1, value_name = "DIR")]
    export: Option<Option<PathBuf>>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Exit with an error if any imbalance is detected
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        hemp_core::logging::init_with_level("debug");
    } else {
        hemp_core::logging::init_with_level("warn");
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!("Feed rate {:.2} kg/hr", config.feed.rate);

    match cli.command {
        Some(Commands::Run(args)) => cmd_run(&config, args),
        Some(Commands::Stages) => cmd_stages(&config),
        Some(Commands::Query { stream, component }) => cmd_query(&config, &stream, &component),
        Some(Commands::Defaults) => cmd_defaults(),
        None => {
            // Default to "run" command
            cmd_run(&config, RunArgs::default())
        }
    }
}

fn cmd_run(config: &Config, args: RunArgs) -> Result<()> {
    let report = run(config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_report(&report);
    }

    if let Some(dir) = args.export {
        let dir = dir.unwrap_or_else(|| config.output.dir.clone());
        let written = write_csv_tables(&report, &dir)?;
        let json_path = dir.join(REPORT_FILE);
        write_json_report(&report, &json_path)?;

        if !args.json {
            println!("✓ Exported report to {}", dir.display());
            for path in written.iter().chain(std::iter::once(&json_path)) {
                println!("  {}", path.display());
            }
        }
    }

    if args.strict && !report.warnings().is_empty() {
        for warning in report.warnings() {
            eprintln!("Imbalance: {}", warning);
        }
        std::process::exit(2);
    }

    Ok(())
}

fn cmd_stages(config: &Config) -> Result<()> {
    let pipeline = hemp_pipeline(config);
    pipeline.validate(&[FEED.to_string()])?;

    println!("Feed: {}", FEED);
    for (i, stage) in pipeline.stages().iter().enumerate() {
        println!(
            "{:>2}. {}: {} → {}",
            i + 1,
            stage.name,
            stage.consumes.join(", "),
            stage.produces.join(", ")
        );
    }
    println!("Products: {}", pipeline.terminal_streams().join(", "));

    Ok(())
}

fn cmd_query(config: &Config, stream: &str, component: &str) -> Result<()> {
    let component: Component = component.parse()?;
    let report = run(config)?;

    let record = match report.stream(stream) {
        Ok(record) => record,
        Err(_) => report.loss(stream)?,
    };
    println!("{:.6}", record.get(component));

    Ok(())
}

fn cmd_defaults() -> Result<()> {
    print!("{}", Config::default().to_toml()?);
    Ok(())
}

fn display_report(report: &RunReport) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  HEMP MASS BALANCE");
    println!("╰─────────────────────────────────────────╯");
    println!();

    for step in report.steps() {
        println!("  {}", step.name);
        println!("    Mass Input:   {:>10.2} kg/hr", step.mass_input);
        println!("    Mass Output:  {:>10.2} kg/hr", step.mass_output);
        println!("    Waste Output: {:>10.2} kg/hr", step.waste_output);
    }

    println!();
    println!("─────────────────────────────────────────");
    println!("Losses (kg/hr)");
    for loss in report.losses() {
        println!("  {:<28} {:>10.2}", loss.name, loss.record.total());
    }

    println!();
    println!("─────────────────────────────────────────");
    println!("Final Products (kg/hr)");
    for name in report.products() {
        if let Ok(record) = report.stream(name) {
            println!("  {:<28} {:>10.2}", name, record.total());
        }
    }

    let balance = report.balance();
    println!();
    println!("─────────────────────────────────────────");
    println!("Total Mass Input:  {:.2} kg/hr", balance.total_input);
    println!("Total Mass Output: {:.2} kg/hr", balance.total_output);
    println!("Total Waste:       {:.2} kg/hr", balance.total_waste);
    println!("Mass Balance Difference: {:.2} kg/hr", balance.residual);

    if !report.warnings().is_empty() {
        println!();
        for warning in report.warnings() {
            println!("  ⚠ {}", warning);
        }
    }

    println!();
}
