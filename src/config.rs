use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::net::{IpAddr, SocketAddr};

use crate::core::clock::parse_start_period;
use crate::core::validation::DEFAULT_MAX_TERM_MONTHS;
use crate::core::{LoanTerms, StartPeriod, ValidationPolicy};

#[derive(Parser, Debug)]
#[command(
    name = "emi",
    version,
    about = "Loan EMI calculator: amortization schedules over HTTP or on the terminal"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = CliLogLevel::Info,
        help = "Minimum log level written to stderr"
    )]
    pub log_level: CliLogLevel,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP calculator service
    Serve(ServeArgs),
    /// Print the amortization schedule for one loan
    Schedule(ScheduleArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LevelFilter {
    fn from(value: CliLogLevel) -> Self {
        match value {
            CliLogLevel::Error => LevelFilter::Error,
            CliLogLevel::Warn => LevelFilter::Warn,
            CliLogLevel::Info => LevelFilter::Info,
            CliLogLevel::Debug => LevelFilter::Debug,
            CliLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(default_value_t = 8080, help = "TCP port to listen on")]
    pub port: u16,
    #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
    pub bind: IpAddr,
    #[arg(
        long,
        help = "Base URL used in shareable links, e.g. https://emi.example.com; defaults to the request Host",
        long_help = "Base URL used in shareable links, e.g. https://emi.example.com.\n\n\
            Without it, links are built from the Host header the client sent, which any client \
            can set to an arbitrary value. Set this whenever the server is reachable publicly \
            or sits behind a reverse proxy."
    )]
    pub public_url: Option<String>,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_TERM_MONTHS,
        help = "Longest loan tenure accepted, in months"
    )]
    pub max_term_months: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    #[arg(long, help = "Principal in currency units")]
    pub loan_amount: f64,
    #[arg(long, help = "Annual interest rate in percent, e.g. 8.5")]
    pub interest_rate: f64,
    #[arg(long, required_unless_present = "tenure_months")]
    pub tenure_years: Option<i64>,
    #[arg(long, conflicts_with = "tenure_years")]
    pub tenure_months: Option<i64>,
    #[arg(long, help = "First month of the schedule as YYYY-MM; defaults to the current month")]
    pub start: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    #[arg(long, default_value_t = DEFAULT_MAX_TERM_MONTHS)]
    pub max_term_months: u32,
}

/// Settings the HTTP service runs with.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub addr: SocketAddr,
    pub public_url: Option<String>,
    pub policy: ValidationPolicy,
}

pub fn build_serve_config(args: ServeArgs) -> Result<ServeConfig, String> {
    if args.max_term_months == 0 {
        return Err("--max-term-months must be > 0".to_string());
    }

    let public_url = match args.public_url {
        Some(url) => {
            let url = url.trim().trim_end_matches('/').to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err("--public-url must start with http:// or https://".to_string());
            }
            Some(url)
        }
        None => None,
    };

    Ok(ServeConfig {
        addr: SocketAddr::new(args.bind, args.port),
        public_url,
        policy: ValidationPolicy {
            max_term_months: args.max_term_months,
        },
    })
}

impl ScheduleArgs {
    pub fn terms(&self) -> Result<LoanTerms, String> {
        let term_months = match (self.tenure_years, self.tenure_months) {
            (Some(years), _) => years
                .checked_mul(12)
                .ok_or_else(|| "--tenure-years is too large".to_string())?,
            (None, Some(months)) => months,
            (None, None) => {
                return Err("one of --tenure-years or --tenure-months is required".to_string());
            }
        };
        Ok(LoanTerms {
            principal: self.loan_amount,
            annual_rate_percent: self.interest_rate,
            term_months,
        })
    }

    pub fn start_period(&self) -> Result<Option<StartPeriod>, String> {
        self.start.as_deref().map(parse_start_period).transpose()
    }

    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_term_months: self.max_term_months,
        }
    }
}
