mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::loan::{PaymentArgs, PayoffArgs, RateArgs, ScheduleArgs};

/// Fixed-rate loan calculator
#[derive(Parser)]
#[command(
    name = "loancalc",
    version,
    about = "Fixed-rate loan calculator",
    long_about = "Solve for the monthly payment, payoff date or interest rate of a fixed-rate \
                  amortizing loan given the other three, or print its full amortization \
                  schedule. All math is carried out in 128-bit decimal precision; amounts \
                  are rounded to cents only for display."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Emit solver and dispatch diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate the monthly payment
    Payment(PaymentArgs),
    /// Calculate the number of payments and payoff date
    Payoff(PayoffArgs),
    /// Calculate the interest rate implied by a payment
    Rate(RateArgs),
    /// Print the month-by-month amortization schedule
    Schedule(ScheduleArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "loan_engine_core=debug,loancalc=debug"
    } else {
        "loan_engine_core=warn,loancalc=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // stdout carries the result; diagnostics go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Payment(args) => commands::loan::run_payment(args),
        Commands::Payoff(args) => commands::loan::run_payoff(args),
        Commands::Rate(args) => commands::loan::run_rate(args),
        Commands::Schedule(args) => commands::loan::run_schedule(args),
        Commands::Version => {
            println!("loancalc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
