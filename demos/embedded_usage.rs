//! Minimal embedding example for mvvm-core
//!
//! This example binds a typed view-model to an in-memory reactive store and
//! to a direct callback, then drives updates in both directions. The binding
//! lifecycle is fully managed by the application.

use async_trait::async_trait;
use mvvm_core::path::AttributePath;
use mvvm_core::schema::{FieldError, FieldInfo, ViewModel};
use mvvm_core::traits::ReactiveStore;
use mvvm_core::update::{UpdateObserver, UpdateResult, spawn_update_observer};
use mvvm_core::{Binding, BindingConfig, BindingRegistry, ConnectTarget, MemoryStore, SharedModel};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Settings panel view-model
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Settings {
    display_name: String,
    volume: u8,
    #[serde(default)]
    presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Preset {
    low: u8,
    high: u8,
}

impl ViewModel for Settings {
    fn violations(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.display_name.trim().is_empty() {
            errors.push(FieldError::at(["display_name"], "Display name cannot be blank"));
        }
        if self.volume > 100 {
            errors.push(FieldError::at(["volume"], "Volume must be between 0 and 100"));
        }
        for (i, preset) in self.presets.iter().enumerate() {
            if preset.low >= preset.high {
                errors.push(FieldError::new(
                    AttributePath::root().child("presets").child(i),
                    "low should be lower than high",
                ));
            }
        }
        errors
    }

    fn describe(field: &AttributePath) -> Option<FieldInfo> {
        match field.to_string().as_str() {
            "display_name" => Some(FieldInfo::new().with_title("Display Name")),
            "volume" => Some(
                FieldInfo::new()
                    .with_title("Volume")
                    .with_description("Output volume in percent")
                    .with_example(50),
            ),
            _ => None,
        }
    }
}

/// Prints every update result it receives
struct ConsoleObserver;

#[async_trait]
impl UpdateObserver for ConsoleObserver {
    async fn on_update(&self, result: UpdateResult) {
        println!(
            "[Observer] updated={:?} errored={:?}",
            result.updated, result.errored
        );
        for (path, message) in &result.messages {
            println!("[Observer]   {}: {}", path, message);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = match env::var("MVVM_LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    println!("=== Embedded mvvm-core Example ===\n");

    let store = MemoryStore::new();
    let registry = Arc::new(BindingRegistry::new());
    let config = BindingConfig::default();
    let binding = Binding::with_config(Arc::new(store.clone()), registry.clone(), config)?;

    let settings = Settings {
        display_name: "Living room".into(),
        volume: 40,
        presets: vec![Preset { low: 10, high: 30 }, Preset { low: 40, high: 80 }],
    };

    // Store-backed binding, results consumed by an async observer
    let (callback, stream) = binding.config().update_channel();
    let observer = spawn_update_observer(stream, Arc::new(ConsoleObserver));

    let model = SharedModel::typed(&settings)?;
    let panel = binding.new_bind(
        model.clone(),
        &["display_name", "volume", "presets[1].low"],
        Some(callback),
    )?;
    panel.connect("settings")?;
    panel.refresh_view()?;
    info!("Store keys: {:?}", store.keys());

    // The view edits store keys
    store.set("settings_volume", json!(75));
    store.set("settings_volume", json!(180));
    store.set("settings_presets[1]_low", json!(90));
    println!("Model volume: {}", model.get("volume")?);
    println!("Model presets[1].low: {}", model.get("presets[1].low")?);

    if let Ok(info) = registry.field_info("settings.volume") {
        println!("Label for settings.volume: {:?}", info.title);
    }
    if let Some(message) = registry.validate_parameter("settings.display_name", json!("  "))? {
        println!("Inline hint for blank name: {}", message);
    }

    // Direct-callback binding, results consumed from a stream
    let (callback, mut results) = binding.config().update_channel();
    let widget = binding.new_bind(SharedModel::typed(&settings)?, &[], Some(callback))?;
    let hook = widget
        .connect(ConnectTarget::callback(|value| {
            println!("[Widget] render {}", value);
        }))?
        .ok_or_else(|| anyhow::anyhow!("callback connection returned no hook"))?;

    widget.refresh_view()?;
    hook.call("display_name", json!("Kitchen"))?;
    hook.call("display_name", json!(""))?;

    for _ in 0..2 {
        if let Some(result) = results.next().await {
            println!("[Widget] result {}", serde_json::to_string(&result)?);
        }
    }

    // Teardown: release keys so the observer's stream can end
    panel.disconnect();
    widget.disconnect();
    registry.clear();
    drop(panel);
    drop(widget);
    drop(hook);
    store.clear();
    observer.await?;

    println!("\n=== Example complete ===");
    Ok(())
}
