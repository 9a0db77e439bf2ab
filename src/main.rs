//! Database backup tool
//!
//! Dumps a MySQL or PostgreSQL database to S3 (or a local directory), restores
//! the latest dump, and prunes old dumps down to a daily/weekly/forever schedule.

// dbkeep/src/main.rs
mod adapter;
mod config;
mod errors;
mod naming;
mod orchestrator;
mod retention;
mod store;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use config::AppConfig;
use orchestrator::BackupOrchestrator;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_VAR: &str = "DBKEEP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    let config_path = env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let app_config = AppConfig::load_from_json(&config_path)
        .with_context(|| format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = match args.get(1) {
        Some(arg) => arg.trim().to_string(),
        None => prompt_choice()?,
    };
    if !matches!(choice.as_str(), "1" | "backup" | "2" | "restore" | "3" | "clean") {
        println!("❌ Invalid choice. Please enter '1' (backup), '2' (restore), or '3' (clean).");
        anyhow::bail!("Invalid operation choice");
    }

    let orchestrator = BackupOrchestrator::from_config(&app_config)
        .await
        .context("Failed to set up database adapter and storage")?;

    match choice.as_str() {
        "1" | "backup" => {
            let name = orchestrator.backup().await.context("Backup process failed")?;
            println!("Stored backup {}", name);
        }
        "2" | "restore" => {
            let environment = args.get(2).map(|s| s.trim()).filter(|s| !s.is_empty());
            let name = orchestrator
                .restore(environment)
                .await
                .context("Restore process failed")?;
            println!("Restored {} into {}", name, app_config.credentials.database);
        }
        _ => {
            let report = orchestrator.clean().await.context("Clean process failed")?;
            println!(
                "Kept {} backup(s), deleted {}",
                report.kept.len(),
                report.deleted.len()
            );
            for name in &report.deleted {
                println!("  - {}", name);
            }
        }
    }
    Ok(())
}

/// Prompts for an operation when none was given on the command line.
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Latest Backup (or type 'restore'; pass an environment name as the second argument)");
    println!("3. Clean Old Backups (or type 'clean')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
