//! Status and settings commands.

use color_eyre::Result;

use super::context::CliContext;
use super::output::{or_dash, print_field, print_header, print_ok, print_warn};
use crate::backend::BackendType;
use crate::sync::SyncConfig;

pub fn handle_status_command(ctx: &CliContext) -> Result<()> {
    let state = ctx.manager.status();
    let config = ctx.manager.get_config();

    print_header("KEYSYNC STATUS");
    print_field("Sync", if state.enabled { "enabled" } else { "disabled" });
    print_field("Backend", state.backend_type.as_str());
    print_field("Device", &format!("{} ({})", state.device_name, state.device_id));
    print_field("Last sync", or_dash(state.last_sync_time.as_deref()));
    print_field(
        "Master password",
        if state.master_password_set { "set" } else { "not set" },
    );
    print_field("Auto-sync", &auto_sync_label(&config));
    print_backend_settings(&config);

    if let Some(session) = ctx.manager.session() {
        let auth = ctx.runtime.block_on(session.state());
        let user = auth
            .user
            .as_ref()
            .and_then(|u| u.email.clone().or_else(|| Some(u.id.clone())));
        match (auth.is_authenticated, user) {
            (true, Some(user)) => print_field("Signed in", &user),
            (true, None) => print_field("Signed in", "yes"),
            (false, _) => print_field("Signed in", "no"),
        }
    }

    if !state.master_password_set {
        print_warn("Set a master password first: keysync set-password");
    }
    Ok(())
}

/// Apply `key=value` settings, or print them when none are given.
pub fn handle_configure_command(ctx: &CliContext, settings: &[(String, String)]) -> Result<()> {
    if settings.is_empty() {
        let config = ctx.manager.get_config();
        print_header("SETTINGS");
        print_field("backend", config.backend_type.as_str());
        print_field("interval", &config.sync_interval_minutes.to_string());
        print_field("autoSync", &config.auto_sync.to_string());
        print_backend_settings(&config);
        return Ok(());
    }

    let mut config = ctx.manager.get_config();
    for (key, value) in settings {
        config.set_field(key, value)?;
    }
    ctx.manager.save_config(config)?;
    print_ok(&format!("Saved {} setting(s)", settings.len()));
    Ok(())
}

pub fn handle_enable_command(ctx: &CliContext) -> Result<()> {
    ctx.manager.enable_sync()?;
    print_ok("Sync enabled");
    Ok(())
}

pub fn handle_disable_command(ctx: &CliContext) -> Result<()> {
    ctx.runtime.block_on(ctx.manager.disable_sync())?;
    print_ok("Sync disabled");
    Ok(())
}

fn auto_sync_label(config: &SyncConfig) -> String {
    if config.auto_sync {
        format!("every {} min", config.sync_interval_minutes)
    } else {
        "off".to_string()
    }
}

fn set_or_missing(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        "(set)"
    }
}

fn print_backend_settings(config: &SyncConfig) {
    let b = &config.backends;
    match config.backend_type {
        BackendType::Server => {
            print_field("server.baseUrl", or_dash(Some(b.server.base_url.as_str()).filter(|s| !s.is_empty())));
        }
        BackendType::Gist => {
            print_field("gist.token", set_or_missing(&b.gist.token));
            print_field("gist.gistId", or_dash(b.gist.gist_id.as_deref()));
            print_field("gist.apiBase", &b.gist.api_base);
        }
        BackendType::Webdav => {
            print_field("webdav.url", or_dash(Some(b.webdav.url.as_str()).filter(|s| !s.is_empty())));
            print_field("webdav.username", &b.webdav.username);
            print_field("webdav.password", set_or_missing(&b.webdav.password));
            print_field("webdav.directory", &b.webdav.directory);
        }
    }
}
