//! Command-line argument parsing for keysync.
//!
//! ```text
//! keysync [-v] <command> [args]
//! ```

use std::path::PathBuf;

use crate::backend::BackendType;
use crate::sync::Resolution;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Show sync settings and state
    Status,
    /// Change settings from `key=value` pairs
    Configure { settings: Vec<(String, String)> },
    SetPassword,
    ChangePassword,
    /// Check the master password without syncing
    Unlock,
    /// Rate a password without storing it
    Strength,
    /// Connect to a backend and show its remote state
    Test { backend: Option<BackendType> },
    Pull { file: PathBuf },
    Push { file: PathBuf },
    Sync { file: PathBuf },
    Resolve { resolution: Resolution, file: PathBuf },
    /// Sync on the auto-sync interval until interrupted
    Watch { file: PathBuf },
    Login { email: String },
    Register { email: String, username: String },
    Logout,
    /// Enable sync
    Enable,
    /// Disable sync and forget the master password
    Disable,
    /// Unparseable input, with the reason
    Invalid(String),
}

/// Whether `-v`/`--verbose` appears anywhere in the arguments.
pub fn is_verbose<I>(args: I) -> bool
where
    I: Iterator<Item = String>,
{
    args.skip(1).any(|a| a == "-v" || a == "--verbose")
}

/// Parse command-line arguments and return the command to execute.
///
/// # Examples
///
/// ```
/// use keysync::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["keysync".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name and global flags
    let rest: Vec<String> = args
        .skip(1)
        .filter(|a| a != "-v" && a != "--verbose")
        .collect();
    let Some((command, params)) = rest.split_first() else {
        return CliCommand::Help;
    };

    let file_arg = |name: &str| match params.first() {
        Some(file) => Ok(PathBuf::from(file)),
        None => Err(CliCommand::Invalid(format!("{} needs a snapshot file", name))),
    };

    let parsed = match command.as_str() {
        "--version" | "-V" | "version" => Ok(CliCommand::Version),
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        "status" => Ok(CliCommand::Status),
        "configure" | "config" => parse_settings(params),
        "set-password" => Ok(CliCommand::SetPassword),
        "change-password" => Ok(CliCommand::ChangePassword),
        "unlock" | "verify" => Ok(CliCommand::Unlock),
        "strength" => Ok(CliCommand::Strength),
        "test" => match params.first() {
            None => Ok(CliCommand::Test { backend: None }),
            Some(b) => b
                .parse()
                .map(|backend| CliCommand::Test {
                    backend: Some(backend),
                })
                .map_err(|e: crate::error::ConfigError| CliCommand::Invalid(e.to_string())),
        },
        "pull" => file_arg("pull").map(|file| CliCommand::Pull { file }),
        "push" => file_arg("push").map(|file| CliCommand::Push { file }),
        "sync" => file_arg("sync").map(|file| CliCommand::Sync { file }),
        "watch" => file_arg("watch").map(|file| CliCommand::Watch { file }),
        "resolve" => match params {
            [mode, file, ..] => mode
                .parse()
                .map(|resolution| CliCommand::Resolve {
                    resolution,
                    file: PathBuf::from(file),
                })
                .map_err(|e: crate::error::ConfigError| CliCommand::Invalid(e.to_string())),
            _ => Err(CliCommand::Invalid(
                "resolve needs a mode (local, remote, merge) and a snapshot file".to_string(),
            )),
        },
        "login" => match params.first() {
            Some(email) => Ok(CliCommand::Login {
                email: email.clone(),
            }),
            None => Err(CliCommand::Invalid("login needs an email".to_string())),
        },
        "register" => match params {
            [email, username, ..] => Ok(CliCommand::Register {
                email: email.clone(),
                username: username.clone(),
            }),
            _ => Err(CliCommand::Invalid(
                "register needs an email and a username".to_string(),
            )),
        },
        "logout" => Ok(CliCommand::Logout),
        "enable" => Ok(CliCommand::Enable),
        "disable" => Ok(CliCommand::Disable),
        other => Err(CliCommand::Invalid(format!("unknown command '{}'", other))),
    };

    parsed.unwrap_or_else(|invalid| invalid)
}

fn parse_settings(params: &[String]) -> Result<CliCommand, CliCommand> {
    let mut settings = Vec::with_capacity(params.len());
    for param in params {
        match param.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                settings.push((key.to_string(), value.to_string()))
            }
            _ => {
                return Err(CliCommand::Invalid(format!(
                    "expected key=value, got '{}'",
                    param
                )))
            }
        }
    }
    Ok(CliCommand::Configure { settings })
}
