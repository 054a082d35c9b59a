//! rd - console harness for the review campaign conversation engine

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::{debug, info};

use reviewdaemon::cli::{Cli, Command, OutputFormat, get_log_path, parse_console_line};
use reviewdaemon::collab::{CampaignContext, IdentityResolver, Notification, ProgressStore};
use reviewdaemon::domain::{Affordance, ReviewerIdentity};
use reviewdaemon::engine::templates;
use reviewdaemon::{Config, Response, Runtime, SystemClock};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;
    info!(campaigns = config.campaigns.len(), store_dir = %config.storage.store_dir, "ReviewDaemon loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Run) => cmd_run(&config).await,
        Some(Command::Records { name, phone, format }) => cmd_records(&config, &name, &phone, format).await,
        Some(Command::Sweep) => cmd_sweep(&config).await,
    }
}

async fn cmd_run(config: &Config) -> Result<()> {
    let runtime = Runtime::build(config, Arc::new(SystemClock))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let reconciler = runtime.reconciler.clone();
    let reconciler_task = tokio::spawn(async move { reconciler.run(shutdown_rx).await });

    // Notifications raised outside a reply (warnings, cancellations, reminders)
    let outbox = runtime.outbox.clone();
    let outbox_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            for notification in outbox.drain() {
                print_notification(&notification);
            }
        }
    });

    print_welcome(config);
    let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

    loop {
        let readline = rl.readline(&format!("{} ", ">".bright_green()));
        match readline {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                let Some((identity, message)) = parse_console_line(input) else {
                    println!("{}", "Expected: name|phone|message".yellow());
                    continue;
                };
                let engine = runtime.engine.clone();
                tokio::spawn(async move {
                    let response = engine.handle(&identity, &message).await;
                    print_response(&identity, &response);
                });
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                return Err(eyre::eyre!("Readline error: {}", err));
            }
        }
    }

    let _ = shutdown_tx.send(()).await;
    reconciler_task.await.context("Reconciler task failed")?;
    outbox_task.abort();
    runtime.state.shutdown().await?;
    println!("Goodbye!");
    Ok(())
}

async fn cmd_records(config: &Config, name: &str, phone: &str, format: OutputFormat) -> Result<()> {
    let runtime = Runtime::build(config, Arc::new(SystemClock))?;
    let identity = ReviewerIdentity::new(name, phone);
    let reviewer_id = runtime.state.resolve(&identity).await?;
    let records = runtime.state.find_by_reviewer(reviewer_id).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No records for {}", identity);
            }
            for record in &records {
                println!(
                    "{:>5}  {:<16} {:<16} {:<22} {}",
                    record.id,
                    record.campaign_id,
                    record.store_id,
                    record.status.to_string().cyan(),
                    templates::status_label(record.status)
                );
            }
        }
    }
    runtime.state.shutdown().await?;
    Ok(())
}

async fn cmd_sweep(config: &Config) -> Result<()> {
    let runtime = Runtime::build(config, Arc::new(SystemClock))?;
    let report = runtime.reconciler.sweep().await;
    println!("{:#?}", report);
    for notification in runtime.outbox.drain() {
        print_notification(&notification);
    }
    runtime.state.shutdown().await?;
    Ok(())
}

fn print_welcome(config: &Config) {
    println!();
    println!("{}", "ReviewDaemon console".bright_cyan().bold());
    println!("Campaigns: {}", config.campaigns.len());
    println!("Type {} per line, Ctrl+D to quit", "name|phone|message".yellow());
    println!();
}

fn print_response(identity: &ReviewerIdentity, response: &Response) {
    println!();
    println!("{} {}", "◀".bright_blue(), identity.to_string().bold());
    println!("{}", response.message);
    match &response.affordance {
        Some(Affordance::Buttons(buttons)) => {
            for button in buttons {
                println!("  [{}] {}", button.label.green(), button.value.dimmed());
            }
        }
        Some(Affordance::Cards(cards)) => {
            for card in cards {
                let mut line = format!("  ▸ {} / {} (남은 수량 {})", card.product_name, card.store_name, card.remaining);
                if card.urgent {
                    line.push_str(" 마감임박");
                }
                if card.resumable {
                    line.push_str(" 이어하기");
                }
                println!("{}  {}", line.green(), card.value.dimmed());
                for history in &card.my_history {
                    println!("      {}", history.dimmed());
                }
            }
        }
        Some(Affordance::MultiSelect(select)) => {
            println!(
                "  {} {} (choose {}..={})",
                "select:".green(),
                select.options.join(", "),
                select.min,
                select.max
            );
        }
        None => {}
    }
}

fn describe(context: &CampaignContext) -> String {
    format!(
        "{} [{}]",
        context.product_name.as_deref().unwrap_or(&context.campaign_id),
        context.store_ids.join(", ")
    )
}

fn describe_all(contexts: &[CampaignContext]) -> String {
    contexts.iter().map(describe).collect::<Vec<_>>().join("; ")
}

fn print_notification(notification: &Notification) {
    let line = match notification {
        Notification::Warning { reviewer_id, contexts } => {
            format!("warning -> reviewer {}: {}", reviewer_id, describe_all(contexts))
        }
        Notification::Cancellation { reviewer_id, contexts } => {
            format!("cancellation -> reviewer {}: {}", reviewer_id, describe_all(contexts))
        }
        Notification::ContactRequest { reviewer_id, identity } => {
            format!("contact request -> reviewer {}: {}", reviewer_id, identity)
        }
        Notification::Reminder {
            reviewer_id,
            context,
            deadline,
        } => format!("reminder -> reviewer {}: {} due {}", reviewer_id, describe(context), deadline),
    };
    println!("{} {}", "✉".yellow(), line.yellow());
}
