//! `health-probe` -- waits until a JSON-RPC endpoint answers a method call.
//!
//! Exit status: 0 when the endpoint answered, 2 when the deadline passed,
//! 1 on invalid arguments or setup failure.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use relay_server::probe::{wait_until_ready, ProbeOutcome};
use relay_server::telemetry::{init_tracing, LogFormat};
use tracing::{error, info};

const EXIT_INVALID: u8 = 1;
const EXIT_DEADLINE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "health-probe", version, about = "Poll a JSON-RPC endpoint until it answers", long_about = None)]
struct Args {
    /// JSON-RPC endpoint URL
    #[arg(long, env = "PROBE_URL")]
    url: String,

    /// Method called on every attempt
    #[arg(long, default_value = "web3_clientVersion")]
    method: String,

    /// Pause between attempts, in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Give up after this long, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    deadline_ms: u64,

    /// Log output format: text or json
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    fn validate(&self) -> Result<(), String> {
        let url = reqwest::Url::parse(&self.url).map_err(|e| format!("invalid --url: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported --url scheme {:?}", url.scheme()));
        }
        if self.interval_ms == 0 {
            return Err("--interval-ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_INVALID } else { 0 };
            // Help and version output go to stdout with a zero status.
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if let Err(e) = args.validate() {
        eprintln!("health-probe: {e}");
        return ExitCode::from(EXIT_INVALID);
    }
    if let Err(e) = init_tracing(args.log_format) {
        eprintln!("health-probe: {e}");
        return ExitCode::from(EXIT_INVALID);
    }

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "probe setup failed");
            ExitCode::from(EXIT_INVALID)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let client = reqwest::Client::builder().build()?;

    let outcome = runtime.block_on(wait_until_ready(
        &client,
        &args.url,
        &args.method,
        Duration::from_millis(args.interval_ms),
        Duration::from_millis(args.deadline_ms),
    ));

    Ok(match outcome {
        ProbeOutcome::Ready { result, attempts } => {
            info!(url = %args.url, method = %args.method, attempts, %result, "endpoint ready");
            ExitCode::SUCCESS
        }
        ProbeOutcome::DeadlineExpired {
            attempts,
            last_error,
        } => {
            error!(url = %args.url, attempts, error = %last_error, "endpoint not ready before deadline");
            ExitCode::from(EXIT_DEADLINE)
        }
    })
}
