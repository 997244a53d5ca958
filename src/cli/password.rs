//! Master password commands.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use zeroize::Zeroizing;

use super::context::{prompt_secret, read_secret, CliContext, MASTER_PASSWORD_ENV};
use super::output::{print_field, print_header, print_ok, print_warn};
use crate::crypto::{password_strength, PasswordStrength};

pub fn handle_set_password_command(ctx: &CliContext) -> Result<()> {
    if ctx.manager.has_master_password() {
        return Err(eyre!(
            "A master password is already set. Use: keysync change-password"
        ));
    }
    let password = read_new_password("New master password: ")?;
    let strength = ctx.manager.set_master_password(&password)?;
    print_ok("Master password set");
    print_strength(&strength);
    Ok(())
}

pub fn handle_change_password_command(ctx: &CliContext) -> Result<()> {
    let old = prompt_secret("Current master password: ")?;
    let new = read_new_password("New master password: ")?;
    let strength = ctx.manager.change_master_password(&old, &new)?;
    print_ok("Master password changed");
    print_strength(&strength);
    print_warn("Push again so other devices can read the remote copy with the new password");
    Ok(())
}

pub fn handle_unlock_command(ctx: &CliContext) -> Result<()> {
    ctx.unlock()?;
    print_ok("Master password verified");
    Ok(())
}

pub fn handle_strength_command() -> Result<()> {
    let password = prompt_secret("Password to rate: ")?;
    print_strength(&password_strength(&password));
    Ok(())
}

/// Read a new password, asking twice when reading from the terminal.
fn read_new_password(prompt: &str) -> Result<Zeroizing<String>> {
    if std::env::var_os(MASTER_PASSWORD_ENV).is_some() {
        return read_secret(prompt);
    }
    let first = prompt_secret(prompt)?;
    let second = prompt_secret("Repeat: ")?;
    if first != second {
        return Err(eyre!("Passwords do not match"));
    }
    Ok(first)
}

fn print_strength(strength: &PasswordStrength) {
    print_header("PASSWORD STRENGTH");
    print_field("Rating", &format!("{} ({}/4)", strength.label(), strength.score));
    for tip in &strength.feedback {
        print_warn(tip);
    }
}
