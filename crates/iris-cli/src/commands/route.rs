use super::build_runtime;
use anyhow::Result;
use colored::Colorize;
use iris_application::BackendRouter;
use iris_core::backend::ComputeTask;
use iris_core::config::RuntimeConfig;

pub async fn show(config: &RuntimeConfig, task: ComputeTask) -> Result<()> {
    let runtime = build_runtime(config).await?;
    let device = runtime.router().refresh_device_profile().await?;
    runtime.monitor().sample().await;

    let restricted = runtime.router().is_restricted().await;
    let candidates = BackendRouter::candidates(&device, restricted);
    let listed: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    println!("Device:      {}", device.device_key());
    println!("Thermal:     {}", runtime.state().snapshot().device_state());
    if restricted {
        println!("{}", "Accelerators excluded by thermal policy, CPU only".yellow());
    }
    println!("Candidates:  {}", listed.join(", "));

    let selection = runtime.router().select_backend(task).await?;
    println!(
        "Selected:    {} for {} ({})",
        selection.backend.to_string().green().bold(),
        selection.task,
        selection.reason
    );
    Ok(())
}
