use std::path::Path;
use std::time::Duration;

use crate::app::{Engine, Error, Result};
use crate::config::Config;
use crate::domain::{FetchResult, TypeHint};

/// Explicit file if given, otherwise the default location
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

pub async fn fetch(
    engine: &Engine,
    url: &str,
    hint: Option<TypeHint>,
    deadline_secs: Option<u64>,
    json: bool,
) -> Result<FetchResult> {
    let request = match deadline_secs {
        Some(secs) => engine.request_with_deadline(url, hint, Duration::from_secs(secs.max(1)))?,
        None => engine.request(url, hint)?,
    };

    let result = engine.fetch(request).await;

    if json {
        let out = serde_json::to_string_pretty(&result).map_err(|e| Error::Other(e.to_string()))?;
        println!("{}", out);
    } else {
        eprintln!("{}", summary(&result));
        for attempt in &result.attempts {
            eprintln!("{}", attempt_line(attempt));
        }
        println!("{}", result.text);
    }

    Ok(result)
}

fn summary(result: &FetchResult) -> String {
    match result.source_tier {
        Some(tier) => format!(
            "{} chars from the {} tier ({:?} confidence) in {:.1}s{}",
            result.text.chars().count(),
            tier,
            result.confidence,
            result.elapsed.as_secs_f64(),
            if result.deadline_hit { ", deadline hit" } else { "" }
        ),
        None => format!("No text extracted after {:.1}s", result.elapsed.as_secs_f64()),
    }
}

fn attempt_line(attempt: &crate::domain::TierAttempt) -> String {
    let status = match &attempt.outcome {
        crate::domain::Outcome::Success => "ok".to_string(),
        crate::domain::Outcome::Failure(reason) => format!("failed: {}", reason),
    };
    let mut line = format!("  {:<15} {:>6.1}s  {}", attempt.tier_name(), attempt.elapsed.as_secs_f64(), status);
    for detail in &attempt.details {
        let status = match &detail.outcome {
            crate::domain::Outcome::Success => "ok".to_string(),
            crate::domain::Outcome::Failure(reason) => reason.clone(),
        };
        line.push_str(&format!("\n    - {}: {}", detail.name, status));
    }
    line
}

pub async fn check(engine: &Engine) -> Result<()> {
    println!("Configuration OK");
    let languages = engine.check_ocr().await?;
    println!("Tesseract languages installed: {}", languages.join(", "));
    Ok(())
}

pub fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    if path.exists() && !force {
        println!("Config already exists: {} (use --force to overwrite)", path.display());
        return Ok(());
    }
    Config::create_default_config(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
