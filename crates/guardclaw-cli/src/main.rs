//! guardclaw - GEF ledger verification CLI
//!
//! The trust anchor for GEF ledgers: verify chain integrity, signatures,
//! and schema offline, with nothing but the ledger file and (optionally)
//! the signer's public key.
//!
//! Exit codes are shell-scriptable:
//! 0 = ledger fully valid, 1 = violations found, 2 = error (missing file,
//! unsupported version).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use guardclaw_core::{Ed25519PublicKey, Keypair, RecordType};
use guardclaw_ledger::{Ledger, ReplayEngine, ReplaySummary, ViolationKind};

/// guardclaw - tamper-evident evidence ledgers for autonomous agents
#[derive(Parser, Debug)]
#[command(name = "guardclaw")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a GEF ledger: chain integrity, signatures, schema
    Verify {
        /// Path to the .jsonl ledger file
        ledger: PathBuf,

        /// Trusted signer public key (64 hex chars). Every entry must be
        /// signed by this key.
        #[arg(long)]
        public_key: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Suppress output; use the exit code only
        #[arg(long)]
        quiet: bool,
    },

    /// Generate a signing keypair as hex seed + public key files
    Keygen {
        /// Directory to write guardclaw.seed and guardclaw.pub into
        #[arg(long, default_value = ".guardclaw")]
        out_dir: PathBuf,
    },

    /// Sign and append one record to a ledger
    Append {
        /// Path to the .jsonl ledger file (created if missing)
        ledger: PathBuf,

        /// Path to the hex seed file written by keygen
        #[arg(long)]
        seed_file: PathBuf,

        /// Agent identity the record belongs to
        #[arg(long)]
        agent_id: String,

        /// Record type: execution, intent, result, or failure
        #[arg(long, default_value = "execution")]
        record_type: String,

        /// Payload as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Human,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Verify {
            ledger,
            public_key,
            format,
            quiet,
        } => run_verify(&ledger, public_key.as_deref(), format, quiet),
        Commands::Keygen { out_dir } => match run_keygen(&out_dir) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e:#}");
                ExitCode::from(2)
            }
        },
        Commands::Append {
            ledger,
            seed_file,
            agent_id,
            record_type,
            payload,
        } => match run_append(&ledger, &seed_file, &agent_id, &record_type, &payload) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e:#}");
                ExitCode::from(2)
            }
        },
    }
}

fn run_verify(
    ledger: &PathBuf,
    public_key: Option<&str>,
    format: OutputFormat,
    quiet: bool,
) -> ExitCode {
    let engine = match public_key {
        Some(hex_key) => match Ed25519PublicKey::from_hex(hex_key) {
            Ok(key) => ReplayEngine::with_policy_key(key),
            Err(e) => {
                if !quiet {
                    eprintln!("error: invalid --public-key: {e}");
                }
                return ExitCode::from(2);
            }
        },
        None => ReplayEngine::new(),
    };

    let summary = match engine.verify_file(ledger) {
        Ok(summary) => summary,
        Err(e) => {
            if !quiet {
                eprintln!("error: {e}");
            }
            return ExitCode::from(2);
        }
    };

    if !quiet {
        match format {
            OutputFormat::Human => print_human(ledger, &summary),
            OutputFormat::Json => print_json(&summary),
        }
    }

    if summary.overall_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn print_human(ledger: &PathBuf, summary: &ReplaySummary) {
    println!("GuardClaw ledger verification");
    println!("  ledger        {}", ledger.display());
    println!(
        "  gef version   {}",
        summary.gef_version.as_deref().unwrap_or("unknown")
    );
    println!("  entries       {}", summary.total_entries);
    if !summary.agents_seen.is_empty() {
        println!("  agents        {}", summary.agents_seen.join(", "));
    }
    if !summary.record_type_counts.is_empty() {
        let counts: Vec<String> = summary
            .record_type_counts
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        println!("  record types  {}", counts.join("  "));
    }
    if let (Some(first), Some(last)) = (&summary.first_timestamp, &summary.last_timestamp) {
        println!("  time range    {first} .. {last}");
    }
    println!();

    let count = |kind: ViolationKind| {
        summary
            .violations
            .iter()
            .filter(|v| v.kind == kind)
            .count()
    };
    print_check("chain", summary.chain_valid, count(ViolationKind::ChainBreak));
    print_check(
        "sequence",
        !summary
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::SequenceGap),
        count(ViolationKind::SequenceGap),
    );
    print_check(
        "signatures",
        summary.signatures_valid,
        count(ViolationKind::InvalidSignature),
    );
    print_check("schema", summary.schema_valid, count(ViolationKind::Schema));

    if let (Some(head), Some(seq)) = (&summary.head_hash, summary.head_sequence) {
        println!();
        println!("  chain head    {head}  [seq {seq}]");
    }

    for warning in &summary.warnings {
        println!("  warning       [{}] {}", warning.at_sequence, warning.detail);
    }

    if !summary.violations.is_empty() {
        println!();
        println!("  {:>6}  {:<18}  detail", "seq", "kind");
        for v in &summary.violations {
            println!("  {:>6}  {:<18}  {}", v.at_sequence, v.kind, v.detail);
        }
    }

    println!();
    if summary.overall_valid {
        println!("VALID - ledger integrity confirmed");
    } else {
        println!(
            "INVALID - {} violation(s) found",
            summary.violations.len()
        );
    }
}

fn print_check(label: &str, ok: bool, failures: usize) {
    if ok {
        println!("  {label:<12}  ok");
    } else {
        println!("  {label:<12}  {failures} violation(s)");
    }
}

fn print_json(summary: &ReplaySummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to render summary: {e}"),
    }
}

fn run_keygen(out_dir: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let keypair = Keypair::generate();
    let seed_path = out_dir.join("guardclaw.seed");
    let pub_path = out_dir.join("guardclaw.pub");

    std::fs::write(&seed_path, format!("{}\n", hex::encode(keypair.to_seed())))
        .with_context(|| format!("writing {}", seed_path.display()))?;
    std::fs::write(&pub_path, format!("{}\n", keypair.public_key().to_hex()))
        .with_context(|| format!("writing {}", pub_path.display()))?;

    println!("public key  {}", keypair.public_key().to_hex());
    println!("seed file   {}", seed_path.display());
    println!("pub file    {}", pub_path.display());
    println!();
    println!("Keep the seed file secret; distribute only the public key.");
    Ok(())
}

fn run_append(
    ledger_path: &PathBuf,
    seed_file: &PathBuf,
    agent_id: &str,
    record_type: &str,
    payload: &str,
) -> Result<()> {
    let record_type = RecordType::from_wire(record_type)
        .with_context(|| format!("unknown record type {record_type:?}"))?;

    let payload: serde_json::Value =
        serde_json::from_str(payload).context("payload is not valid JSON")?;
    let serde_json::Value::Object(payload) = payload else {
        anyhow::bail!("payload must be a JSON object");
    };

    let seed_hex = std::fs::read_to_string(seed_file)
        .with_context(|| format!("reading {}", seed_file.display()))?;
    let keypair = Keypair::from_seed_hex(&seed_hex).context("seed file is not a 64-char hex seed")?;

    let mut ledger = Ledger::open(ledger_path, keypair, agent_id)?;
    let envelope = ledger.append(record_type, payload)?;
    ledger.sync()?;

    println!("appended sequence {}  record_id {}", envelope.sequence, envelope.record_id);
    Ok(())
}
