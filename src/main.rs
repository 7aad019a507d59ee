use clap::Parser;
use simple_logger::SimpleLogger;
use std::io::Write;

use emi::config::{Cli, Command, OutputFormat, ScheduleArgs, build_serve_config};
use emi::core::{Clock, SystemClock, calculate};
use emi::export::{render_csv, render_table};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(cli.log_level.into()).init() {
        eprintln!("Logger setup failed: {e}");
    }

    let result = match cli.command {
        Command::Serve(args) => match build_serve_config(args) {
            Ok(config) => emi::api::run_http_server(config)
                .await
                .map_err(|e| format!("Server error: {e}")),
            Err(msg) => Err(msg),
        },
        Command::Schedule(args) => print_schedule(&args),
    };

    if let Err(msg) = result {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

fn print_schedule(args: &ScheduleArgs) -> Result<(), String> {
    let request = args
        .terms()?
        .validate(&args.policy())
        .map_err(|e| e.to_string())?;
    let start = args
        .start_period()?
        .unwrap_or_else(|| SystemClock.current_period());
    let calculation = calculate(&request, start).map_err(|e| e.to_string())?;

    let output = match args.format {
        OutputFormat::Table => render_table(&calculation).into_bytes(),
        OutputFormat::Json => {
            let mut json = serde_json::to_vec_pretty(&calculation)
                .map_err(|e| format!("JSON encoding failed: {e}"))?;
            json.push(b'\n');
            json
        }
        OutputFormat::Csv => render_csv(&calculation, None).map_err(|e| e.to_string())?,
    };

    std::io::stdout()
        .lock()
        .write_all(&output)
        .map_err(|e| format!("Failed to write output: {e}"))
}
