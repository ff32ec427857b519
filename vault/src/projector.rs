//! Projection of citations into the link index.
//!
//! Each pass scans every markdown document in the vault. For each citation
//! whose reference note exists, it records a link from the citing document
//! to that note, so graph views show citation relationships.

use std::collections::{BTreeSet, HashMap};

use bibgraph_citations::CitationPattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::links::{LinkCounts, SharedLinkIndex};
use crate::path::reference_path;
use crate::storage::Vault;

/// How repeated passes combine with existing counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionPolicy {
    /// Every pass adds its counts on top of what is there.
    #[default]
    Accumulate,

    /// Every pass replaces the counts the previous pass contributed.
    Recompute,
}

/// Summary of one projection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionReport {
    /// Documents read and scanned.
    pub documents_scanned: usize,

    /// Documents that could not be read.
    pub documents_skipped: usize,

    /// Citations found across all scanned documents.
    pub citations: usize,

    /// Link increments written to the index.
    pub links_written: u32,

    /// Citekeys with no reference note.
    pub unresolved: BTreeSet<String>,
}

/// Writes citation links into a [`SharedLinkIndex`].
#[derive(Debug, Default)]
pub struct LinkProjector {
    policy: ProjectionPolicy,

    /// Counts contributed by the last pass, per source. Only kept under
    /// [`ProjectionPolicy::Recompute`].
    ledger: HashMap<String, LinkCounts>,
}

impl LinkProjector {
    pub fn new(policy: ProjectionPolicy) -> Self {
        Self {
            policy,
            ledger: HashMap::new(),
        }
    }

    pub fn policy(&self) -> ProjectionPolicy {
        self.policy
    }

    /// Switch policy. The contribution ledger starts over.
    pub fn set_policy(&mut self, policy: ProjectionPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.ledger.clear();
        }
    }

    /// Run one pass over every markdown document in `vault`.
    pub async fn project(
        &mut self,
        vault: &dyn Vault,
        links: &SharedLinkIndex,
        pattern: &CitationPattern,
        reference_folder: &str,
    ) -> Result<ProjectionReport> {
        let mut report = ProjectionReport::default();
        let mut targets: HashMap<String, Option<String>> = HashMap::new();
        let mut seen = BTreeSet::new();

        for source in vault.markdown_files().await? {
            let text = match vault.cached_read(&source).await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping {source}: {e}");
                    report.documents_skipped += 1;
                    continue;
                }
            };
            report.documents_scanned += 1;
            seen.insert(source.clone());

            let mut counts = LinkCounts::new();
            for m in pattern.matches(&text) {
                if m.citekey.is_empty() {
                    continue;
                }
                report.citations += 1;

                let target = match targets.get(m.citekey) {
                    Some(target) => target.clone(),
                    None => {
                        let path = reference_path(reference_folder, m.citekey);
                        let target = vault
                            .entry(&path)
                            .await
                            .filter(|entry| entry.is_file())
                            .map(|_| path);
                        targets.insert(m.citekey.to_string(), target.clone());
                        target
                    }
                };

                match target {
                    Some(target) => *counts.entry(target).or_default() += 1,
                    None => {
                        report.unresolved.insert(m.citekey.to_string());
                    }
                }
            }

            report.links_written += self.write(links, &source, counts).await;
        }

        if self.policy == ProjectionPolicy::Recompute {
            self.retract_missing(links, &seen).await;
        }

        info!(
            "Projected {} citation links from {} documents",
            report.links_written, report.documents_scanned
        );
        Ok(report)
    }

    /// Write one document's counts under a single lock.
    async fn write(&mut self, links: &SharedLinkIndex, source: &str, counts: LinkCounts) -> u32 {
        let previous = match self.policy {
            ProjectionPolicy::Accumulate => None,
            ProjectionPolicy::Recompute => self.ledger.remove(source),
        };
        if counts.is_empty() && previous.is_none() {
            return 0;
        }

        let mut index = links.write().await;
        for (target, count) in previous.iter().flatten() {
            index.decrement(source, target, *count);
        }
        let mut written = 0;
        for (target, count) in &counts {
            index.increment(source, target, *count);
            written += count;
        }
        drop(index);

        if self.policy == ProjectionPolicy::Recompute && !counts.is_empty() {
            self.ledger.insert(source.to_string(), counts);
        }
        written
    }

    /// Withdraw contributions from documents that are gone from the vault.
    async fn retract_missing(&mut self, links: &SharedLinkIndex, seen: &BTreeSet<String>) {
        let gone: Vec<String> = self
            .ledger
            .keys()
            .filter(|source| !seen.contains(*source))
            .cloned()
            .collect();
        if gone.is_empty() {
            return;
        }

        let mut index = links.write().await;
        for source in gone {
            if let Some(previous) = self.ledger.remove(&source) {
                for (target, count) in &previous {
                    index.decrement(&source, target, *count);
                }
                debug!("Retracted links from {source}");
            }
        }
    }
}
