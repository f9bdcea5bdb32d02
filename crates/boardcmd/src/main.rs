use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod diagnose;
mod operations;
mod run;
mod serve;

#[derive(Parser)]
#[command(name = "boardcmd")]
#[command(about = "Edit and diagnose KiCad boards", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Model Context Protocol (MCP) server on stdin/stdout
    Serve(serve::ServeArgs),

    /// Run one board operation against a board file
    #[command(alias = "r")]
    Run(run::RunArgs),

    /// Probe why a board file does not load
    Diagnose(diagnose::DiagnoseArgs),

    /// List the available board operations
    Operations(operations::OperationsArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug; RUST_LOG overrides. Logs go to stderr.
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Serve(args) => serve::execute(args),
        Commands::Run(args) => run::execute(args),
        Commands::Diagnose(args) => diagnose::execute(args),
        Commands::Operations(args) => operations::execute(args),
    }
}
