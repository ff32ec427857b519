//! `bibgraph`: citation links and reference notes for a markdown vault.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bibgraph_citations::{CitationForm, CitationMatch, render_markdown};
use bibgraph_plugin::{BiblatexGraph, HostSignal, SettingsStore};
use bibgraph_vault::{
    FsVault, LinkIndex, ProjectionPolicy, Resolution, Vault, VaultWatcher, Workspace,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bibgraph")]
#[command(about = "Citation highlighting, reference notes and graph links for a markdown vault")]
#[command(version)]
struct Cli {
    /// Vault root directory
    #[arg(short, long, default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the citations in a document
    Scan {
        /// Vault-relative path of the document
        file: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render a document to HTML with citation markers
    Render {
        /// Vault-relative path of the document
        file: String,
    },

    /// Run one projection pass and print the link index
    Project {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Open, or create, the reference note for a citekey
    Open {
        citekey: String,
    },

    /// Project once, then re-project whenever a markdown file changes
    Watch,

    /// Show or update the persisted settings
    Config {
        /// Citation prefix (empty resets to "@")
        #[arg(long)]
        prefix: Option<String>,

        /// Reference folder (empty resets to "references")
        #[arg(long)]
        folder: Option<String>,

        /// Create missing reference notes on activation
        #[arg(long)]
        auto_create: Option<bool>,

        /// How repeated projection passes combine
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Accumulate,
    Recompute,
}

impl From<PolicyArg> for ProjectionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Accumulate => ProjectionPolicy::Accumulate,
            PolicyArg::Recompute => ProjectionPolicy::Recompute,
        }
    }
}

/// Workspace that reports opened notes and notices on the terminal.
struct ConsoleWorkspace;

#[async_trait]
impl Workspace for ConsoleWorkspace {
    async fn open_file(&self, path: &str) -> bibgraph_vault::Result<()> {
        println!("open {path}");
        Ok(())
    }

    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let vault = Arc::new(
        FsVault::new(&cli.vault)
            .with_context(|| format!("cannot open vault {}", cli.vault.display()))?,
    );
    let store = SettingsStore::in_vault(vault.root());
    let (graph, signals) = BiblatexGraph::load(
        store,
        vault.clone(),
        Arc::new(ConsoleWorkspace),
        LinkIndex::new().shared(),
    )
    .await?;
    debug!("Opened vault at {}", vault.root().display());

    match cli.command {
        Commands::Scan { file, json } => {
            let text = vault.cached_read(&file).await?;
            let pattern = graph.pattern();
            if json {
                let citations: Vec<_> = pattern
                    .matches(&text)
                    .map(|m| m.to_owned_citation())
                    .collect();
                println!("{}", serde_json::to_string_pretty(&citations)?);
            } else {
                for m in pattern.matches(&text) {
                    println!("{}", format_match(&m));
                }
            }
        }

        Commands::Render { file } => {
            let text = vault.cached_read(&file).await?;
            let mut fragment = render_markdown(&text);
            let markers = graph.post_process(&mut fragment);
            debug!("Rendered {file} with {markers} citation markers");
            println!("{}", fragment.to_html());
        }

        Commands::Project { json } => {
            let report = graph.project().await?;
            let links = graph.links().read().await;
            if json {
                let output = serde_json::json!({
                    "report": report,
                    "links": &*links,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for (source, targets) in links.iter() {
                    for (target, count) in targets {
                        println!("{source} -> {target}\t{count}");
                    }
                }
                eprintln!(
                    "{} documents scanned, {} skipped, {} citations, {} unresolved",
                    report.documents_scanned,
                    report.documents_skipped,
                    report.citations,
                    report.unresolved.len()
                );
            }
        }

        Commands::Open { citekey } => match graph.resolve(&citekey).await? {
            Resolution::Opened(path) => println!("opened {path}"),
            Resolution::Created(path) => println!("created {path}"),
            Resolution::NotFound(path) => println!("not found {path}"),
            Resolution::Occupied(path) => println!("folder in the way at {path}"),
        },

        Commands::Watch => {
            watch(Arc::new(graph), signals, vault.root().to_path_buf()).await?;
        }

        Commands::Config {
            prefix,
            folder,
            auto_create,
            policy,
        } => {
            if let Some(prefix) = prefix {
                graph.set_citation_prefix(&prefix).await?;
            }
            if let Some(folder) = folder {
                graph.set_reference_folder(&folder).await?;
            }
            if let Some(enabled) = auto_create {
                graph.set_auto_create_note(enabled).await?;
            }
            if let Some(policy) = policy {
                graph.set_projection_policy(policy.into()).await?;
            }
            println!("{}", serde_json::to_string_pretty(&graph.settings().await)?);
        }
    }

    Ok(())
}

/// Re-project on every markdown change until interrupted.
async fn watch(
    graph: Arc<BiblatexGraph>,
    mut signals: tokio::sync::mpsc::Receiver<HostSignal>,
    root: PathBuf,
) -> Result<()> {
    let (mut watcher, mut events) = VaultWatcher::new(&root)?;
    watcher.start()?;
    info!("Watching {}", watcher.root().display());

    report_pass(&graph).await;

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if event.affects_links() {
                    debug!("{:?} {}", event.kind, event.path);
                    report_pass(&graph).await;
                }
            }
            Some(signal) = signals.recv() => {
                graph.dispatch(signal).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watcher");
                break;
            }
        }
    }

    watcher.stop();
    Ok(())
}

async fn report_pass(graph: &BiblatexGraph) {
    match graph.project().await {
        Ok(report) => println!(
            "projected {} links from {} documents",
            report.links_written, report.documents_scanned
        ),
        Err(e) => error!("Projection failed: {e}"),
    }
}

fn format_match(m: &CitationMatch<'_>) -> String {
    let form = match m.form {
        CitationForm::Bracketed => "bracketed",
        CitationForm::Bare => "bare",
    };
    format!(
        "{}..{}\t{form}\t{}\t{}",
        m.start,
        m.end,
        m.citekey,
        m.locator.unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibgraph_citations::CitationPattern;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_match() {
        let pattern = CitationPattern::compile("@").unwrap();
        let lines: Vec<_> = pattern
            .matches("See [@doe2020, p. 4] and @roe.")
            .map(|m| format_match(&m))
            .collect();
        assert_eq!(
            lines,
            vec![
                "4..20\tbracketed\tdoe2020\tp. 4".to_string(),
                "25..30\tbare\troe.\t".to_string(),
            ]
        );
    }

    #[test]
    fn test_config_flags() {
        let cli = Cli::parse_from([
            "bibgraph",
            "--vault",
            "notes",
            "config",
            "--prefix",
            "#",
            "--auto-create",
            "false",
            "--policy",
            "recompute",
        ]);
        assert_eq!(cli.vault, PathBuf::from("notes"));
        match cli.command {
            Commands::Config {
                prefix,
                folder,
                auto_create,
                policy,
            } => {
                assert_eq!(prefix.as_deref(), Some("#"));
                assert_eq!(folder, None);
                assert_eq!(auto_create, Some(false));
                assert_eq!(policy.map(ProjectionPolicy::from), Some(ProjectionPolicy::Recompute));
            }
            _ => panic!("expected config command"),
        }
    }
}
