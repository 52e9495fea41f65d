use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::Value;
use wormlog_ledger::{parse_input, LedgerConfig, LedgerService};
use wormlog_server::{ServerConfig, WormlogServer};
use wormlog_types::{ListOptions, Record, VerifyRange, VerifyResult};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Append(args) => cmd_append(args, format).await,
        Command::Get(args) => cmd_get(args, format).await,
        Command::List(args) => cmd_list(args, format).await,
        Command::Verify(args) => cmd_verify(args, format).await,
        Command::Delete(args) => cmd_delete(args, format).await,
    }
}

fn ledger() -> anyhow::Result<LedgerService> {
    let config = LedgerConfig::from_env().context("loading ledger configuration")?;
    Ok(LedgerService::from_config(&config)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<ExitCode> {
    let base = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    let mut config = base.apply_env(|name| std::env::var(name).ok())?;
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    let ledger = Arc::new(ledger()?);
    WormlogServer::new(config, ledger).serve().await?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_append(args: AppendArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let text = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("reading {}", args.file.display()))?
    };
    let value: Value = serde_json::from_str(&text).context("entry is not valid JSON")?;
    let result = ledger()?.append(parse_input(value)?).await?;
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => {
            println!("{} Appended {}", "✓".green().bold(), result.key.yellow());
            println!("  Retention until: {}", wormlog_types::format_iso8601(&result.retention_until));
            match &result.entry.sig.prev_hash {
                Some(prev) => println!("  Prev hash: {}", prev.dimmed()),
                None => println!("  Prev hash: {}", "genesis".cyan()),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_record_line(record: &Record) {
    let hold = if record.legal_hold { " [legal hold]".red().to_string() } else { String::new() };
    println!(
        "{}  {}  {}  {}{}",
        record.key.yellow(),
        record.entry.entry.result.to_string().bold(),
        record.entry.entry.actor,
        record.entry.entry.ts_iso.dimmed(),
        hold
    );
}

async fn cmd_get(args: GetArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let Some(record) = ledger()?.get(&args.key).await? else {
        bail!("record {} not found", args.key);
    };
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            print_record_line(&record);
            println!("  Session: {}", record.entry.entry.session_id);
            println!("  Safe copy: {}/{}", record.entry.entry.safe_copy.bucket, record.entry.entry.safe_copy.key);
            println!("  Retention until: {}", wormlog_types::format_iso8601(&record.retention_until));
            println!("  HMAC: {}", record.entry.sig.hmac.dimmed());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list(args: ListArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let options = ListOptions {
        start_key: args.start_key,
        end_key: args.end_key,
        cursor: args.cursor,
        limit: args.limit.map(|n| n as usize),
    };
    let page = ledger()?.list(&options).await?;
    match format {
        OutputFormat::Json => print_json(&page)?,
        OutputFormat::Text => {
            if page.items.is_empty() {
                println!("No records.");
            }
            for record in &page.items {
                print_record_line(record);
            }
            if let (true, Some(cursor)) = (page.is_truncated, &page.cursor) {
                println!("More records: --cursor {}", cursor.cyan());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_verify_text(result: &VerifyResult) {
    if result.valid {
        println!("{} Audit chain integrity verified", "✓".green().bold());
    } else {
        println!("{} Audit chain broken", "✗".red().bold());
    }
    println!("  Checked: {}", result.checked.to_string().bold());
    if let Some(start) = &result.range_start {
        println!("  From: {start}");
    }
    if let Some(end) = &result.range_end {
        println!("  To: {end}");
    }
    for diff in &result.diffs {
        println!("  {} {} at {}", "✗".red(), diff.reason.to_string().red(), diff.key.yellow());
        println!("    expected: {}", diff.expected.as_deref().unwrap_or("null").dimmed());
        println!("    actual:   {}", diff.actual.as_deref().unwrap_or("null").dimmed());
    }
}

async fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let range = VerifyRange {
        start_key: args.start_key,
        end_key: args.end_key,
        limit: args.limit.map(|n| n as usize),
    };
    let result = ledger()?.verify(&range).await?;
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_verify_text(&result),
    }
    Ok(if result.valid { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

async fn cmd_delete(args: DeleteArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    ledger()?.delete(&args.key).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "deleted": true }))?,
        OutputFormat::Text => println!("{} Deleted {}", "✓".green(), args.key.yellow()),
    }
    Ok(ExitCode::SUCCESS)
}
