use super::build_runtime;
use anyhow::Result;
use colored::Colorize;
use iris_core::config::RuntimeConfig;
use iris_core::thermal::{DeviceThermalState, MemoryState};
use iris_execution::RuntimeEvent;
use tokio::sync::mpsc;

pub async fn show(config: &RuntimeConfig, json: bool) -> Result<()> {
    let runtime = build_runtime(config).await?;
    let device = runtime.router().refresh_device_profile().await?;
    runtime.monitor().sample().await;
    let status = runtime.state().snapshot();

    if json {
        let value = serde_json::json!({ "device": device, "status": status });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "=== Iris status ===".bright_magenta().bold());
    println!(
        "Device:      {} ({} / {}, {} MiB free of {} MiB)",
        device.device_class,
        device.soc_model,
        device.gpu_model,
        device.available_ram_bytes >> 20,
        device.total_ram_bytes >> 20
    );
    let temperature = status
        .last_reading
        .as_ref()
        .map(|r| format!("{:.1}°C", r.celsius))
        .unwrap_or_else(|| "unavailable".to_string());
    let thermal = format!("{} ({}), {}", status.device_state(), status.thermal_state, temperature);
    let thermal = match status.device_state() {
        DeviceThermalState::Normal => thermal.green(),
        DeviceThermalState::Hot => thermal.yellow(),
        DeviceThermalState::Overheating => thermal.red(),
    };
    println!("Thermal:     {}", thermal);
    let memory = status.memory_state.to_string();
    let memory = match status.memory_state {
        MemoryState::Normal => memory.green(),
        MemoryState::Low => memory.yellow(),
        MemoryState::Critical => memory.red(),
    };
    println!("Memory:      {}", memory);
    println!("Profile:     {}", status.profile.to_string().cyan());
    Ok(())
}

/// Runs the background loops and prints forwarded runtime events until Ctrl-C.
pub async fn watch(config: &RuntimeConfig, mut events: mpsc::UnboundedReceiver<RuntimeEvent>) -> Result<()> {
    let runtime = build_runtime(config).await?;
    runtime.start();
    println!("{}", "Watching runtime events, Ctrl-C to stop".bright_magenta().bold());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
            }
        }
    }

    runtime.shutdown().await?;
    Ok(())
}

fn print_event(event: &RuntimeEvent) {
    let target = format!("[{}]", event.target);
    let target = match event.level.as_str() {
        "ERROR" => target.red(),
        "WARN" => target.yellow(),
        _ => target.cyan(),
    };
    println!("{} {} {}", event.timestamp.dimmed(), target, event.message);
}
