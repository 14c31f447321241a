use super::build_runtime;
use anyhow::{Context, Result};
use colored::Colorize;
use futures::StreamExt;
use iris_core::config::RuntimeConfig;
use iris_core::inference::{GenerationParameters, InferenceEvent, ModelDescriptor, ModelParameterOverrides};
use iris_execution::IrisRuntime;
use iris_infrastructure::IrisPaths;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_CONTEXT_SIZE: u32 = 4096;

pub struct ChatOptions {
    pub model: PathBuf,
    pub message: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

pub async fn run(config: &RuntimeConfig, options: ChatOptions) -> Result<()> {
    let runtime = build_runtime(config).await?;
    runtime.start();

    let result = chat(&runtime, config, options).await;
    runtime.shutdown().await?;
    result
}

async fn chat(runtime: &IrisRuntime, config: &RuntimeConfig, options: ChatOptions) -> Result<()> {
    let descriptor = descriptor_for(&options.model).await;
    let loaded = runtime
        .inference()
        .load_model(descriptor, ModelParameterOverrides::default())
        .await
        .with_context(|| format!("Failed to load {}", options.model.display()))?;
    println!(
        "{}",
        format!(
            "Loaded {} on {} (context {})",
            loaded.descriptor.name, loaded.parameters.backend, loaded.parameters.context_size
        )
        .green()
    );

    let parameters = GenerationParameters {
        max_tokens: options.max_tokens.unwrap_or(config.inference.generation.max_tokens),
        temperature: options.temperature.unwrap_or(config.inference.generation.temperature),
        ..config.inference.generation
    };
    let conversations = runtime.conversations();
    let conversation = conversations.create_conversation(None).await?;

    if let Some(message) = options.message {
        return send(runtime, &conversation.id, &message, parameters).await;
    }

    println!("{}", "=== Iris chat ===".bright_magenta().bold());
    println!("{}", "Type 'quit' to exit.".dimmed());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green());
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "quit" | "exit" => break,
            _ => send(runtime, &conversation.id, trimmed, parameters).await?,
        }
    }

    let metrics = conversations.metrics();
    println!(
        "{}",
        format!(
            "{} messages, {} tokens, {:.1} tokens/s",
            metrics.messages_sent,
            metrics.generated_tokens,
            metrics.average_tokens_per_second()
        )
        .dimmed()
    );
    Ok(())
}

async fn send(
    runtime: &IrisRuntime,
    conversation_id: &str,
    text: &str,
    parameters: GenerationParameters,
) -> Result<()> {
    let mut events = runtime
        .conversations()
        .send_message(conversation_id, text, Some(parameters))
        .await?;

    while let Some(event) = events.next().await {
        match event {
            InferenceEvent::GenerationStarted { profile, thermal_state, .. } => {
                if profile.is_thermally_limited() {
                    eprintln!(
                        "{}",
                        format!("Throttled: {} profile ({})", profile, thermal_state).yellow()
                    );
                }
            }
            InferenceEvent::TokenGenerated { token, .. } => {
                print!("{}", token);
                std::io::stdout().flush()?;
            }
            InferenceEvent::GenerationCompleted {
                token_count,
                processing_time_ms,
                ..
            } => {
                println!();
                println!(
                    "{}",
                    format!("({} tokens in {} ms)", token_count, processing_time_ms).dimmed()
                );
            }
            InferenceEvent::SafetyViolation { stage, reason } => {
                println!();
                eprintln!("{}", format!("Blocked by {} safety check: {}", stage, reason).red());
            }
            InferenceEvent::Error { message } => {
                println!();
                eprintln!("{}", format!("Generation failed: {}", message).red());
            }
        }
    }
    Ok(())
}

/// Describes a model file; the file size doubles as the RAM requirement.
async fn descriptor_for(path: &Path) -> ModelDescriptor {
    let resolved = match IrisPaths::models_dir() {
        Ok(dir) if path.is_relative() && !path.exists() => dir.join(path),
        _ => path.to_path_buf(),
    };
    let size = tokio::fs::metadata(&resolved).await.map(|m| m.len()).unwrap_or(0);
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());

    ModelDescriptor {
        name: id.clone(),
        id,
        path: resolved,
        memory_requirement_bytes: size,
        native_context_size: DEFAULT_CONTEXT_SIZE,
        file_size_bytes: None,
    }
}
