use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use tracing::{info, warn};

use railcheck::batch::{JsonFileSource, MessageSource, validate_batch};
use railcheck::config::EngineConfig;
use railcheck::validation::{Message, Validator};

const USAGE: &str = "\
Usage:
  railcheck validate <messages.json>
  railcheck check [--line <line>] [--sent-at \"DD/MM/YYYY HH:MM:SS\"] <text...>
  railcheck rules";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config = EngineConfig::from_env();
    let validator = Arc::new(
        tokio::task::spawn_blocking({
            let config = config.clone();
            move || Validator::from_config(&config)
        })
        .await
        .context("loading reference data")?,
    );

    match command.as_str() {
        "validate" => validate_file(validator, rest, config.batch_workers).await,
        "check" => check_text(validator, rest).await,
        "rules" => list_rules(validator).await,
        other => {
            eprintln!("Unknown command '{other}'\n{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn validate_file(
    validator: Arc<Validator>,
    args: &[String],
    workers: usize,
) -> anyhow::Result<()> {
    let [path] = args else {
        bail!("validate takes exactly one file\n{USAGE}");
    };

    let source = JsonFileSource::new(path);
    let messages = source.fetch().await?;
    info!(source = source.name(), count = messages.len(), "Messages loaded");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing messages already started");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let batch = validate_batch(validator, messages, workers, stop).await;
    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}

async fn check_text(validator: Arc<Validator>, args: &[String]) -> anyhow::Result<()> {
    let mut line = String::new();
    let mut sent_at = chrono::Local::now()
        .format(railcheck::validation::types::SENT_AT_FORMAT)
        .to_string();
    let mut words = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--line" => line = iter.next().context("--line needs a value")?.clone(),
            "--sent-at" => sent_at = iter.next().context("--sent-at needs a value")?.clone(),
            _ => words.push(arg.as_str()),
        }
    }
    if words.is_empty() {
        bail!("check needs the message text\n{USAGE}");
    }

    let message = Message {
        id: "cli".to_string(),
        content: words.join(" "),
        line,
        operator: String::new(),
        sent_at,
    };
    let report = tokio::task::spawn_blocking(move || validator.validate(&message))
        .await
        .context("validation task failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn list_rules(validator: Arc<Validator>) -> anyhow::Result<()> {
    // first access reads the rule directory
    let rules = tokio::task::spawn_blocking(move || validator.registry().rules())
        .await
        .context("loading override rules")?;
    for rule in rules.rules() {
        println!(
            "{:<8} {:<16} {:<14} {}{}",
            rule.id,
            rule.origin,
            format!("{:?}", rule.action),
            rule.regex.as_str(),
            if rule.active { "" } else { "  (inactive)" }
        );
    }
    for skipped in rules.skipped() {
        println!("skipped  {:<16} {}", skipped.origin, skipped.reason);
    }
    eprintln!(
        "{} rules loaded, {} skipped",
        rules.len(),
        rules.skipped().len()
    );
    Ok(())
}
