//! Doctor command - verify system requirements and configuration.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use console::style;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

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

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    Output::header("Shadowify Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let tools = vec![
        check_ytdlp(&settings.downloader.binary),
        check_whisper(&settings.whisper.binary),
    ];
    print_section("External Tools", &tools);
    checks.extend(tools);

    let models = vec![
        check_model("Detection model", &settings.whisper.detect_model),
        check_model("Transcription model", &settings.whisper.transcribe_model),
        check_model("Recording model", &settings.whisper.recording_model),
    ];
    print_section("Whisper Models", &models);
    checks.extend(models);

    let classifier = vec![check_classifier(&settings.classifier.endpoint).await];
    print_section("Difficulty Classifier", &classifier);
    checks.extend(classifier);

    let dirs = check_directories(settings);
    print_section("Directories", &dirs);
    checks.extend(dirs);

    let config = vec![check_config_file(config_path)];
    print_section("Configuration", &config);
    checks.extend(config);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before ingesting videos.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Shadowify is ready to use.");
    }

    Ok(())
}

fn check_ytdlp(binary: &str) -> CheckResult {
    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok("yt-dlp", &truncate(&version, 50))
        }
        Ok(_) => CheckResult::error("yt-dlp", "installed but not working", install_hint_ytdlp()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error("yt-dlp", &format!("{} not found", binary), install_hint_ytdlp())
        }
        Err(e) => CheckResult::error("yt-dlp", &format!("error: {}", e), install_hint_ytdlp()),
    }
}

fn check_whisper(binary: &str) -> CheckResult {
    match preflight::check_binary(binary) {
        Ok(()) => CheckResult::ok("whisper-cli", binary),
        Err(_) => CheckResult::error(
            "whisper-cli",
            &format!("{} not found", binary),
            "Build whisper.cpp and set whisper.binary in the config file",
        ),
    }
}

fn check_model(name: &str, path: &str) -> CheckResult {
    match preflight::check_model(path) {
        Ok(()) => {
            let expanded = Settings::expand_path(path);
            let size = std::fs::metadata(&expanded)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            CheckResult::ok(name, &format!("{} ({})", expanded.display(), size))
        }
        Err(_) => CheckResult::error(
            name,
            &format!("{} missing", path),
            "Download ggml models with whisper.cpp's models/download-ggml-model.sh",
        ),
    }
}

/// Any HTTP response counts as reachable; only transport failures are reported.
async fn check_classifier(endpoint: &str) -> CheckResult {
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(3)).build() {
        Ok(c) => c,
        Err(e) => return CheckResult::error("Endpoint", &e.to_string(), "Check TLS setup"),
    };

    match client.get(endpoint).send().await {
        Ok(response) => CheckResult::ok(
            "Endpoint",
            &format!("{} (HTTP {})", endpoint, response.status().as_u16()),
        ),
        Err(e) => CheckResult::warning(
            "Endpoint",
            &format!("{} unreachable: {}", endpoint, e),
            "Start the prediction service or set classifier.endpoint",
        ),
    }
}

fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (name, dir) in [("Data directory", settings.data_dir()), ("Temp directory", settings.temp_dir())] {
        if dir.exists() {
            results.push(CheckResult::ok(name, &dir.display().to_string()));
        } else {
            results.push(CheckResult::warning(
                name,
                &format!("{} (will be created)", dir.display()),
                "Directory will be created on first use",
            ));
        }
    }

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
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first ingestion",
        ));
    }

    results
}

fn check_config_file(config_path: Option<PathBuf>) -> CheckResult {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: shadowify config init",
        )
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
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

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}
