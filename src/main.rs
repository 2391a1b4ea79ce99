//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: solvra_interp CLI entry point
// Objective: Run the built-in demo scopes with optional profiling, choose the
//            backtrace style and format, and report unhandled faults
//=====================================================

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand};

use solvra_interp::backtrace::{Format, Gather};
use solvra_interp::profile::{PrinterKind, ProfilePrinter};
use solvra_interp::{Runtime, RuntimeConfig, ThreadContext, Value, demos, logging, run_script};

#[derive(Parser, Debug)]
#[command(name = "solvra_interp", about = "SolvraScript IR interpreter core")]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file; defaults to the per-user config when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one of the built-in demo programs.
    Run(RunArgs),
    /// List the built-in demo programs.
    List,
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Demo name (see `list`).
    pub demo: String,

    /// Profile the run and print a report.
    #[arg(long, value_parser = parse_printer)]
    pub profile: Option<PrinterKind>,

    /// Backtrace gathering style: raw, normal, full or caller.
    #[arg(long, value_parser = parse_gather)]
    pub style: Option<Gather>,

    /// Backtrace layout: mri, jruby or rubinius.
    #[arg(long, value_parser = parse_format)]
    pub format: Option<Format>,

    /// Count THREAD_POLL hits and list scopes at or above this count.
    #[arg(long = "hot-scopes")]
    pub hot_scopes: Option<u64>,
}

fn parse_printer(value: &str) -> Result<PrinterKind, String> {
    PrinterKind::parse(value)
        .ok_or_else(|| format!("unknown printer '{value}' (flat, graph, json)"))
}

fn parse_gather(value: &str) -> Result<Gather, String> {
    Gather::parse(value)
        .ok_or_else(|| format!("unknown style '{value}' (raw, normal, full, caller)"))
}

fn parse_format(value: &str) -> Result<Format, String> {
    Format::parse(value).ok_or_else(|| format!("unknown format '{value}' (mri, jruby, rubinius)"))
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);
    match dispatch(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: Args) -> Result<ExitCode> {
    let config = load_config(args.config.as_ref())?;
    match args.command {
        Command::Run(cmd) => run_demo(config, cmd),
        Command::List => {
            for demo in demos::all() {
                println!("{:<8} {}", demo.name, demo.summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            let rendered = toml::to_string_pretty(&config).context("serialising configuration")?;
            print!("{rendered}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::load(path),
        None => RuntimeConfig::load_default(),
    }
}

fn run_demo(mut config: RuntimeConfig, args: RunArgs) -> Result<ExitCode> {
    let demo = demos::find(&args.demo).ok_or_else(|| anyhow!("unknown demo '{}'", args.demo))?;
    if let Some(style) = args.style {
        config.backtrace.style = style;
    }
    if let Some(format) = args.format {
        config.backtrace.format = format;
    }
    if args.hot_scopes.is_some() {
        config.thread_poll_sampling = true;
    }
    let color = config.backtrace.color;

    let runtime = Runtime::new(config);
    let mut ctx = ThreadContext::new(runtime.clone());
    if args.profile.is_some() {
        ctx.start_profiling();
    }

    tracing::info!(demo = demo.name, "running demo");
    let outcome = run_script(&mut ctx, &demo.script());

    if let (Some(kind), Some(mut data)) = (args.profile, ctx.stop_profiling()) {
        let printer = ProfilePrinter::new(&mut data, runtime.profiled_methods());
        print!("{}", printer.render(kind));
    }
    if let Some(threshold) = args.hot_scopes {
        for (scope, count) in runtime.hot_scopes(threshold) {
            println!("hot scope #{}: {count} polls", scope.0);
        }
    }

    match outcome {
        Ok(value) => {
            if !matches!(value, Value::Nil) {
                tracing::debug!(result = %value.inspect(), "demo finished");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err.render(runtime.trace_type(), color));
            tracing::debug!(code = err.code_str(), "demo failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

//=====================================================
// End of file
//=====================================================
