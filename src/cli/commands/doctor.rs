//! Doctor command - verify system requirements and configuration.

use crate::cli::output::truncate;
use crate::cli::Output;
use crate::config::{Settings, WarehouseBackend};
use console::style;
use std::path::PathBuf;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("Agent Gallery Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    print_section(&mut checks, "API Configuration", vec![check_api_key(settings)]);
    print_section(&mut checks, "Warehouse", check_warehouse(settings));
    print_section(&mut checks, "Travel", vec![check_scenario(settings)]);
    print_section(
        &mut checks,
        "Configuration",
        vec![check_config_file(config_path), check_prompts_dir(settings)],
    );

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running the agents.",
            errors
        ));
        anyhow::bail!("{} check(s) failed", errors);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! The agents are ready to use.");
    }

    Ok(())
}

fn print_section(checks: &mut Vec<CheckResult>, title: &str, results: Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &results {
        check.print();
    }
    println!();
    checks.extend(results);
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_cmd: &str, hint: &str) -> CheckResult {
    let parts: Vec<&str> = version_cmd.split_whitespace().collect();
    let Some((cmd, args)) = parts.split_first() else {
        return CheckResult::error(name, "no command to run", hint);
    };

    match Command::new(cmd).args(args).output() {
        Ok(output) if output.status.success() => {
            // Try to extract version from first line
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            CheckResult::ok(name, &truncate(&version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check if the LLM API key is configured.
fn check_api_key(settings: &Settings) -> CheckResult {
    let var = settings.llm.api_key_env.as_str();
    let hint = format!("Set with: export {}='sk-...'", var);

    match std::env::var(var) {
        Ok(key) if key.chars().count() > 20 => {
            let chars: Vec<char> = key.chars().collect();
            let masked = format!(
                "{}...{}",
                chars[..7].iter().collect::<String>(),
                chars[chars.len() - 4..].iter().collect::<String>()
            );
            CheckResult::ok(var, &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => CheckResult::error(var, "empty", &hint),
        Ok(_) => CheckResult::warning(var, "set but looks too short", "Check the key value"),
        Err(_) if settings.llm.api_base.is_some() => CheckResult::warning(
            var,
            "not set (custom endpoint configured)",
            "Local endpoints often accept any key",
        ),
        Err(_) => CheckResult::error(var, "not set", &hint),
    }
}

/// Check the selected warehouse backend.
fn check_warehouse(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![CheckResult::ok(
        "Backend",
        &settings.warehouse.backend.to_string(),
    )];

    match settings.warehouse.backend {
        WarehouseBackend::Bigquery => {
            results.push(match &settings.warehouse.project_id {
                Some(project) => CheckResult::ok("Project", project),
                None => CheckResult::error(
                    "Project",
                    "not set",
                    "Set warehouse.project_id or export GOOGLE_CLOUD_PROJECT=...",
                ),
            });
            results.push(match &settings.warehouse.dataset_id {
                Some(dataset) => CheckResult::ok("Dataset", dataset),
                None => CheckResult::error(
                    "Dataset",
                    "not set",
                    "Set warehouse.dataset_id or export BQ_DATASET_ID=...",
                ),
            });

            let token_env = settings.warehouse.access_token_env.as_str();
            if std::env::var(token_env).map(|t| !t.is_empty()).unwrap_or(false) {
                results.push(CheckResult::ok("Credentials", &format!("{} is set", token_env)));
            } else {
                results.push(check_tool("gcloud", "gcloud --version", install_hint_gcloud()));
            }
        }
        WarehouseBackend::Sqlite => {
            let db_path = settings.sqlite_path();
            if db_path.exists() {
                let size = std::fs::metadata(&db_path)
                    .map(|m| format_size(m.len()))
                    .unwrap_or_else(|_| "unknown size".to_string());
                results.push(CheckResult::ok(
                    "Database",
                    &format!("{} ({})", db_path.display(), size),
                ));
            } else {
                results.push(CheckResult::error(
                    "Database",
                    &format!("{} (not found)", db_path.display()),
                    "Set warehouse.sqlite_path to an existing SQLite file",
                ));
            }
        }
    }

    results
}

/// Check the default travel scenario.
fn check_scenario(settings: &Settings) -> CheckResult {
    match settings.scenario_path() {
        Some(path) if path.exists() => CheckResult::ok("Scenario", &format!("{}", path.display())),
        Some(path) => CheckResult::warning(
            "Scenario",
            &format!("{} (not found)", path.display()),
            "Fix travel.scenario_path or pass --scenario",
        ),
        None => CheckResult::warning(
            "Scenario",
            "not configured",
            "Set travel.scenario_path or pass --scenario to trip and agent commands",
        ),
    }
}

/// Check if config file exists.
fn check_config_file(path: Option<&PathBuf>) -> CheckResult {
    let config_path = path.cloned().unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: agent-gallery config init",
        )
    }
}

/// Check the custom prompts directory, if configured.
fn check_prompts_dir(settings: &Settings) -> CheckResult {
    match settings.prompts.custom_dir.as_deref() {
        None => CheckResult::ok("Prompts", "built-in"),
        Some(dir) => {
            let path = Settings::expand_path(dir);
            if path.is_dir() {
                CheckResult::ok("Prompts", &format!("custom ({})", path.display()))
            } else {
                CheckResult::warning(
                    "Prompts",
                    &format!("{} (not a directory)", path.display()),
                    "Built-in prompts will be used",
                )
            }
        }
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for the Google Cloud CLI.
fn install_hint_gcloud() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install --cask google-cloud-sdk, or export BQ_ACCESS_TOKEN"
    } else {
        "Install from: https://cloud.google.com/sdk/docs/install, or export BQ_ACCESS_TOKEN"
    }
}
