//! Command execution against the configured storage

use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{Cli, Command};
use crate::config::AppConfig;
use crate::domain::clock::SystemClock;
use crate::domain::container::RawContainer;
use crate::domain::serializer::{SerializerRegistry, TypeDescriptor};
use crate::infrastructure::logging;
use crate::infrastructure::serializer::default_registry;
use crate::infrastructure::storage::StorageFactory;

/// Load configuration, connect the backend and run one command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config(None)?;
    logging::init_logging(&config.logging);

    let schemas = config.schema_registry()?;
    let storage_config = config.storage.storage_config()?;
    let storages =
        StorageFactory::create_all(&storage_config, &schemas, Arc::new(SystemClock)).await?;

    if let Command::Init = cli.command {
        for schema in schemas.iter() {
            println!("{} -> {}", schema.kind, schema.table);
        }
        info!(kinds = storages.len(), "Storage initialized");
        return Ok(());
    }

    let storage = storages.storage_for(&cli.kind)?;

    match cli.command {
        Command::Get { serialized_key } => {
            let row = storage.get_by_serialized_key(&serialized_key).await?;

            if row.is_miss() {
                println!("miss");
            } else {
                println!("{}", render_row(&default_registry(), &row));
            }
        }
        Command::Remove { serialized_key } => {
            let removed = storage.remove_by_serialized_key(&serialized_key).await?;
            println!("removed {}", removed);
        }
        Command::Invalidate { related_key } => {
            let removed = storage.remove_relatives_by_related_key(&related_key).await?;
            println!("removed {}", removed);
        }
        Command::Count => {
            println!("{}", storage.count().await?);
        }
        Command::Init => {}
    }

    Ok(())
}

fn load_config(vars: Option<config::Map<String, String>>) -> anyhow::Result<AppConfig> {
    AppConfig::load_with_env(vars).context("Failed to load configuration")
}

/// Human-readable dump of a stored row
fn render_row(serializers: &SerializerRegistry, row: &RawContainer) -> String {
    let mut lines = Vec::new();

    if let Some(body) = &row.body {
        lines.push(format!("body: {}", render_payload(serializers, body)));
    }
    if let Some(attachment) = &row.attachment {
        lines.push(format!("attachment: {}", render_payload(serializers, attachment)));
    }
    if let Some(saved_at) = row.saved_at_millis {
        lines.push(format!("saved_at: {}", render_millis(saved_at)));
    }
    if let Some(requested_at) = row.requested_at_millis {
        lines.push(format!("requested_at: {}", render_millis(requested_at)));
    }

    lines.join("\n")
}

/// Unwraps checksum framing when present, then prints UTF-8 text or base64
fn render_payload(serializers: &SerializerRegistry, bytes: &[u8]) -> String {
    let payload = serializers
        .decode::<Vec<u8>>(&TypeDescriptor::serde::<Vec<u8>>(), bytes)
        .unwrap_or_else(|_| bytes.to_vec());

    match String::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => format!("base64:{}", STANDARD.encode(e.into_bytes())),
    }
}

fn render_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}
