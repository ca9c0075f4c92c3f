use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, SecondsFormat};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use vds_crypto::{RootVerifier, SigningKey};
use vds_service::{Sequencer, SequencerConfig, ServiceConfig, TreeService};
use vds_storage::MapUpdate;
use vds_types::{
    AnyPayload, HashStrategy, SignatureCipherSuite, SignedLogRoot, SignedMapRoot, SystemClock,
    Timestamp, Tree, TreeSpec, TreeType,
};

use crate::cli::*;

/// A tree and its root history, as exported by `demo` and read by `verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootHistory {
    pub tree: Tree,
    #[serde(default)]
    pub log_roots: Vec<SignedLogRoot>,
    #[serde(default)]
    pub map_roots: Vec<SignedMapRoot>,
}

impl RootHistory {
    fn len(&self) -> usize {
        self.log_roots.len() + self.map_roots.len()
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Keygen => cmd_keygen(cli.format),
        Command::Config(args) => cmd_config(args, cli.format),
        Command::Demo(args) => cmd_demo(args, cli.format),
        Command::Verify(args) => cmd_verify(args, cli.format),
    }
}

fn cmd_keygen(format: OutputFormat) -> anyhow::Result<()> {
    let key = SigningKey::generate();
    let public_key = hex::encode(key.verifying_key().as_bytes());
    let private_key = key.to_payload();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "cipher_suite": SignatureCipherSuite::Ed25519,
                "public_key": public_key,
                "private_key": {
                    "type_url": private_key.type_url,
                    "value": hex::encode(&private_key.value),
                },
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} Generated {} key", "✓".green().bold(), "ED25519".cyan());
            println!("  Public key:  {}", public_key.yellow());
            println!("  Private key: {}", hex::encode(&private_key.value).dimmed());
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ServiceConfig::default()),
    }
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.path.as_deref())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let history = run_demo(&args)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
        OutputFormat::Text => print_history(&history),
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let public_key = hex::decode(args.public_key.trim()).context("public key is not hex")?;
    let history = load_history(&args.file)?;
    let count = verify_history(&history, &public_key)?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "tree_id": history.tree.tree_id,
                "roots": count,
                "verified": true,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} {} roots of tree {} verified",
                "✓".green().bold(),
                count.to_string().bold(),
                history.tree.tree_id.to_string().yellow()
            );
            println!("  Signatures: {}", "valid".green());
            println!("  Revisions: {}", "consecutive".green());
            println!("  Timestamps: {}", "non-decreasing".green());
        }
    }
    Ok(())
}

/// Create a tree, write `batches` batches to it, and return its history.
pub fn run_demo(args: &DemoArgs) -> anyhow::Result<RootHistory> {
    let config = load_config(args.config.as_deref())?;
    let service = Arc::new(TreeService::in_memory(&config, Arc::new(SystemClock)));

    let (tree_type, hash_strategy) = match args.tree_type {
        DemoTreeType::Log => (TreeType::Log, HashStrategy::Rfc6962Sha256),
        DemoTreeType::Map => (TreeType::Map, HashStrategy::TestMapHasher),
    };
    let key = SigningKey::generate();
    let tree = service.create_tree(TreeSpec {
        tree_type: Some(tree_type),
        hash_strategy: Some(hash_strategy),
        signature_cipher_suite: Some(SignatureCipherSuite::Ed25519),
        public_key: Some(key.verifying_key().as_bytes().to_vec()),
        private_key: Some(key.to_payload()),
        display_name: Some("demo".into()),
        max_root_duration: args.idle_ms.map(Duration::from_millis).unwrap_or_default(),
        ..Default::default()
    })?;
    let tree_id = tree.tree_id;

    for batch in 0..args.batches {
        match tree_type {
            TreeType::Log => {
                let leaves = (0..args.leaves)
                    .map(|i| format!("batch-{batch}/leaf-{i}").into_bytes())
                    .collect();
                service.queue_leaves(tree_id, leaves)?;
            }
            TreeType::Map => {
                let updates = (0..args.leaves)
                    .map(|i| MapUpdate::set(format!("key-{i}"), format!("value-{batch}-{i}")))
                    .collect();
                let epoch = serde_json::to_vec(&serde_json::json!({ "epoch": batch + 1 }))?;
                let metadata = AnyPayload::new("application/json", epoch);
                service.set_map_leaves(tree_id, updates, Some(metadata))?;
            }
        }
    }

    if let Some(idle_ms) = args.idle_ms {
        if config.sequencer.enabled {
            wait_for_idle_roots(Arc::clone(&service), Duration::from_millis(idle_ms))?;
        } else {
            tracing::warn!("sequencer disabled in config, no idle roots will be issued");
        }
    }

    let tree = service.get_tree(tree_id)?;
    let history = match tree_type {
        TreeType::Log => RootHistory {
            log_roots: service.log_roots(tree_id)?,
            map_roots: Vec::new(),
            tree,
        },
        TreeType::Map => RootHistory {
            log_roots: Vec::new(),
            map_roots: service.map_roots(tree_id)?,
            tree,
        },
    };
    Ok(history)
}

/// Run the sequencer long enough for at least one idle interval to pass.
fn wait_for_idle_roots(service: Arc<TreeService>, idle: Duration) -> anyhow::Result<()> {
    let poll = SequencerConfig {
        enabled: true,
        interval_ms: (idle.as_millis() as u64 / 4).max(1),
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let sequencer = Sequencer::new(service, &poll);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sequencer.run(shutdown_rx).await });
        tokio::time::sleep(idle * 3).await;
        shutdown_tx.send(true)?;
        handle.await?;
        Ok::<_, anyhow::Error>(())
    })
}

pub fn load_history(path: &Path) -> anyhow::Result<RootHistory> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Check every root in `history` against `public_key`. Returns the number
/// of roots verified.
pub fn verify_history(history: &RootHistory, public_key: &[u8]) -> anyhow::Result<usize> {
    let tree = &history.tree;
    let verifier = RootVerifier::new(public_key);
    match tree.tree_type {
        TreeType::Log => {
            if !history.map_roots.is_empty() {
                bail!("log tree {} has map roots", tree.tree_id);
            }
            if let Some(first) = history.log_roots.first() {
                if first.log_id != tree.tree_id {
                    bail!("roots belong to tree {}, not {}", first.log_id, tree.tree_id);
                }
            }
            verifier.verify_log_sequence(&history.log_roots)?;
        }
        TreeType::Map => {
            if !history.log_roots.is_empty() {
                bail!("map tree {} has log roots", tree.tree_id);
            }
            if let Some(first) = history.map_roots.first() {
                if first.map_id != tree.tree_id {
                    bail!("roots belong to tree {}, not {}", first.map_id, tree.tree_id);
                }
            }
            verifier.verify_map_sequence(&history.map_roots)?;
        }
    }
    Ok(history.len())
}

fn format_time(ts: Timestamp) -> String {
    let nanos = ts.as_nanos();
    let (secs, subsec) = (nanos.div_euclid(1_000_000_000), nanos.rem_euclid(1_000_000_000));
    DateTime::from_timestamp(secs, subsec as u32)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .unwrap_or_else(|| ts.to_string())
}

fn short_hash(hash: &[u8]) -> String {
    hex::encode(&hash[..hash.len().min(8)])
}

fn print_history(history: &RootHistory) {
    let tree = &history.tree;
    println!(
        "{} {} tree {} ({})",
        "✓".green().bold(),
        tree.tree_type.to_string().cyan(),
        tree.tree_id.to_string().yellow().bold(),
        tree.hash_strategy
    );
    println!("  Public key: {}", hex::encode(&tree.public_key).dimmed());
    for root in &history.log_roots {
        println!(
            "  {}  size {:>4}  {}  {}",
            format!("r#{}", root.tree_revision).yellow(),
            root.tree_size,
            short_hash(&root.root_hash).dimmed(),
            format_time(root.timestamp_nanos)
        );
    }
    for root in &history.map_roots {
        let metadata = root
            .metadata
            .as_ref()
            .map(|m| String::from_utf8_lossy(&m.value).into_owned())
            .unwrap_or_default();
        println!(
            "  {}  {}  {}  {}",
            format!("r#{}", root.map_revision).yellow(),
            short_hash(&root.root_hash).dimmed(),
            format_time(root.timestamp_nanos),
            metadata.blue()
        );
    }
}
