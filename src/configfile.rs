//! Generated configuration document for the managed application
//!
//! The forum reads a single JSON document at startup. Stoker renders it
//! from the resolved [`LaunchConfig`], writes it under the config
//! directory, and mirrors it into the application's working directory
//! (the application only looks beside its own entry point). Rendering is
//! deterministic: the same resolved settings produce byte-identical
//! output, so repeated launches never dirty the file.

use crate::error::{StokerError, StokerResult};
use crate::settings::LaunchConfig;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Name of the document beside the application entry point
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Serialize)]
struct DatabaseDocument<'a> {
    host: &'a str,
    port: u16,
    username: &'a str,
    password: &'a str,
    name: &'a str,
    auth_source: &'a str,
    ssl: bool,
}

#[derive(Debug, Serialize)]
struct ConfigDocument<'a> {
    url: &'a str,
    port: u16,
    secret: &'a str,
    session_store: &'a str,
    database: DatabaseDocument<'a>,
}

/// Render the configuration document as pretty JSON
pub fn render(config: &LaunchConfig) -> StokerResult<String> {
    let doc = ConfigDocument {
        url: &config.site_url,
        port: config.port,
        secret: &config.session_secret,
        session_store: "db",
        database: DatabaseDocument {
            host: &config.database.host,
            port: config.database.port,
            username: &config.database.username,
            password: &config.database.password,
            name: &config.database.name,
            auth_source: &config.database.auth_source,
            ssl: config.database.ssl,
        },
    };

    let mut content = serde_json::to_string_pretty(&doc)?;
    content.push('\n');
    Ok(content)
}

/// Runtime path the application reads the document from
pub fn runtime_path(config: &LaunchConfig) -> PathBuf {
    config.app_dir.join(CONFIG_FILE_NAME)
}

/// Write the document to the config directory and mirror it beside the
/// application entry point
pub async fn write(config: &LaunchConfig) -> StokerResult<PathBuf> {
    let content = render(config)?;

    let primary = config.config_dir.join(CONFIG_FILE_NAME);
    fs::write(&primary, &content)
        .await
        .map_err(|e| StokerError::io(format!("writing config to {}", primary.display()), e))?;

    let mirror = runtime_path(config);
    fs::write(&mirror, &content)
        .await
        .map_err(|e| StokerError::io(format!("mirroring config to {}", mirror.display()), e))?;

    info!("Configuration written to {} (mirrored to {})", primary.display(), mirror.display());
    Ok(mirror)
}
