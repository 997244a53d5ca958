//! CLI module for keysync.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Settings, master password and account commands
//! - Pull, push, sync, conflict resolution and auto-sync
//!
//! # Usage
//!
//! ```ignore
//! use keysync::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! if let Err(e) = run_cli_command(command) {
//!     eprintln!("Error: {}", e);
//!     std::process::exit(1);
//! }
//! ```

pub mod account;
pub mod args;
pub mod context;
pub mod output;
pub mod password;
pub mod settings;
pub mod sync;

pub use args::{is_verbose, parse_args, CliCommand};
pub use context::CliContext;

use color_eyre::eyre::eyre;
use color_eyre::Result;

/// The current version of keysync, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: keysync [-v] <command> [args]

Settings:
  status                          Show sync state
  configure [key=value ...]       Show or change settings
  enable | disable                Turn sync on or off

Master password:
  set-password | change-password
  unlock                          Check the master password
  strength                        Rate a password

Sync (FILE is the local snapshot JSON):
  pull FILE | push FILE | sync FILE
  resolve local|remote|merge FILE
  watch FILE                      Sync on the auto-sync interval
  test [server|gist|webdav]       Check a backend connection

Server account:
  login EMAIL | register EMAIL USERNAME | logout";

/// Run a parsed command to completion.
pub fn run_cli_command(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("keysync {}", VERSION);
            return Ok(());
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        CliCommand::Invalid(reason) => {
            eprintln!("{}", USAGE);
            return Err(eyre!(reason));
        }
        CliCommand::Strength => return password::handle_strength_command(),
        _ => {}
    }

    let ctx = CliContext::open()?;
    let result = match command {
        CliCommand::Status => settings::handle_status_command(&ctx),
        CliCommand::Configure { settings } => settings::handle_configure_command(&ctx, &settings),
        CliCommand::Enable => settings::handle_enable_command(&ctx),
        CliCommand::Disable => settings::handle_disable_command(&ctx),
        CliCommand::SetPassword => password::handle_set_password_command(&ctx),
        CliCommand::ChangePassword => password::handle_change_password_command(&ctx),
        CliCommand::Unlock => password::handle_unlock_command(&ctx),
        CliCommand::Test { backend } => sync::handle_test_command(&ctx, backend),
        CliCommand::Pull { file } => sync::handle_pull_command(&ctx, &file),
        CliCommand::Push { file } => sync::handle_push_command(&ctx, &file),
        CliCommand::Sync { file } => sync::handle_sync_command(&ctx, &file),
        CliCommand::Resolve { resolution, file } => {
            sync::handle_resolve_command(&ctx, resolution, &file)
        }
        CliCommand::Watch { file } => sync::handle_watch_command(&ctx, &file),
        CliCommand::Login { email } => account::handle_login_command(&ctx, &email),
        CliCommand::Register { email, username } => {
            account::handle_register_command(&ctx, &email, &username)
        }
        CliCommand::Logout => account::handle_logout_command(&ctx),
        CliCommand::Version
        | CliCommand::Help
        | CliCommand::Invalid(_)
        | CliCommand::Strength => Ok(()),
    };
    ctx.shutdown();
    result
}
