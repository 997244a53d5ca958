use color_eyre::Result;
use keysync::cli::{is_verbose, parse_args, run_cli_command};

/// Environment variable holding the log filter, e.g. `keysync=debug`.
const LOG_ENV: &str = "KEYSYNC_LOG";

fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so command output stays clean on stdout
    let default_level = if is_verbose(std::env::args()) {
        "keysync=debug"
    } else {
        "keysync=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run_cli_command(parse_args(std::env::args()))
}
