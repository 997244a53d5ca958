//! Server account commands.

use color_eyre::eyre::eyre;
use color_eyre::Result;

use super::context::{prompt_secret, CliContext};
use super::output::print_ok;
use crate::auth::AuthState;

pub fn handle_login_command(ctx: &CliContext, email: &str) -> Result<()> {
    let session = ctx.session()?;
    let password = prompt_secret("Account password: ")?;
    let state = ctx.runtime.block_on(session.login(email, &password))?;
    print_ok(&format!("Signed in as {}", display_user(&state, email)));
    Ok(())
}

pub fn handle_register_command(ctx: &CliContext, email: &str, username: &str) -> Result<()> {
    let session = ctx.session()?;
    let password = prompt_secret("Account password: ")?;
    let repeat = prompt_secret("Repeat: ")?;
    if password != repeat {
        return Err(eyre!("Passwords do not match"));
    }
    let state = ctx
        .runtime
        .block_on(session.register(email, username, &password))?;
    print_ok(&format!("Registered and signed in as {}", display_user(&state, email)));
    Ok(())
}

pub fn handle_logout_command(ctx: &CliContext) -> Result<()> {
    let session = ctx.session()?;
    ctx.runtime.block_on(session.logout())?;
    ctx.manager.forget_master_password();
    print_ok("Signed out");
    Ok(())
}

fn display_user(state: &AuthState, fallback: &str) -> String {
    state
        .user
        .as_ref()
        .and_then(|u| u.username.clone().or_else(|| u.email.clone()))
        .unwrap_or_else(|| fallback.to_string())
}
