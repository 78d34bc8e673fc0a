//! Fetch, classify, resolve folders, confirm, then move
//!
//! A run is split in two so nothing is mutated before the operator agrees:
//! [`Reconciler::plan`] reads the mailbox (and creates missing folders) and
//! returns a [`Plan`]; only [`Plan::confirm`] with the exact confirmation word
//! yields the [`ConfirmedPlan`] that [`Reconciler::apply`] accepts.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::RuleSet;
use crate::client::MailboxClient;
use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::grouping::{Grouping, PreviewEntry, RunStats};
use crate::models::{EmailCategory, LabelInfo, LabelNaming, Message, INBOX_LABEL_ID};

/// Called after each metadata fetch with (done, total)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Which folder is being sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Sort the inbox with every rule
    Triage,
    /// Re-sort the catch-all folder with the specific rules only
    Reclassify,
}

impl Pass {
    pub fn rule_set(&self) -> RuleSet {
        match self {
            Pass::Triage => RuleSet::Full,
            Pass::Reclassify => RuleSet::Reclassify,
        }
    }

    /// Category of the folder being sorted, if it is one of ours
    pub fn current_category(&self) -> Option<EmailCategory> {
        match self {
            Pass::Triage => None,
            Pass::Reclassify => Some(EmailCategory::CATCH_ALL),
        }
    }
}

/// Knobs for one reconciler run
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub page_size: u32,
    /// 0 follows every page
    pub max_pages: u32,
    pub max_concurrent_requests: usize,
    pub progress_interval: usize,
    pub naming: LabelNaming,
    /// When false, missing folders are reported instead of created
    pub create_missing_labels: bool,
}

impl ReconcileSettings {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            page_size: config.scan.page_size,
            max_pages: config.scan.max_pages,
            max_concurrent_requests: config.scan.max_concurrent_requests,
            progress_interval: config.scan.progress_interval,
            naming: config.labels.naming,
            create_missing_labels: !dry_run,
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStatus {
    Existing,
    Created,
    /// Missing and not created (dry run)
    Pending,
}

/// Target folder for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLabel {
    pub category: EmailCategory,
    pub name: String,
    pub id: Option<String>,
    pub status: LabelStatus,
}

/// How planning ended
#[derive(Debug)]
pub enum PlanOutcome {
    /// The folder to re-sort does not exist
    SourceMissing { label_name: String },
    /// The source folder holds no messages
    Empty { source: LabelInfo },
    /// Every message stays where it is
    NothingToMove { source: LabelInfo, scanned: usize },
    Ready(Plan),
}

/// Everything the preview shows; no message has been touched yet
#[derive(Debug, Clone)]
pub struct Plan {
    pub pass: Pass,
    pub source: LabelInfo,
    pub scanned: usize,
    pub grouping: Grouping,
    pub labels: Vec<ResolvedLabel>,
    naming: LabelNaming,
}

impl Plan {
    pub fn label_for(&self, category: EmailCategory) -> Option<&ResolvedLabel> {
        self.labels.iter().find(|l| l.category == category)
    }

    pub fn labels_with_status(&self, status: LabelStatus) -> Vec<&ResolvedLabel> {
        self.labels.iter().filter(|l| l.status == status).collect()
    }

    pub fn preview(&self, samples: usize, width: usize) -> Vec<PreviewEntry> {
        self.grouping.preview(self.naming, samples, width)
    }

    /// Gate the move step on the operator's answer
    ///
    /// Only an answer equal to `confirm_word` confirms. The comparison is
    /// case-sensitive and ignores nothing but the trailing line terminator.
    /// Confirming a plan whose folders were never created is an error.
    pub fn confirm(self, response: &str, confirm_word: &str) -> Result<Confirmation> {
        let answer = response.trim_end_matches(&['\r', '\n'][..]);
        if answer != confirm_word {
            debug!("Confirmation refused with {:?}", answer);
            return Ok(Confirmation::Cancelled);
        }

        let mut moves = Vec::with_capacity(self.labels.len());
        for (category, messages) in self.grouping.iter() {
            let label = self.label_for(category).ok_or_else(|| {
                TriageError::LabelError(format!("No folder resolved for {}", category))
            })?;
            let label_id = label.id.clone().ok_or_else(|| {
                TriageError::LabelError(format!(
                    "Folder '{}' was not created (dry run); nothing can be moved into it",
                    label.name
                ))
            })?;
            moves.push(Move {
                category,
                label_id,
                messages: messages.to_vec(),
            });
        }

        Ok(Confirmation::Confirmed(ConfirmedPlan {
            source_label_id: self.source.id,
            moves,
        }))
    }
}

#[derive(Debug)]
pub enum Confirmation {
    Confirmed(ConfirmedPlan),
    Cancelled,
}

#[derive(Debug, Clone)]
struct Move {
    category: EmailCategory,
    label_id: String,
    messages: Vec<Message>,
}

/// A plan the operator agreed to; only obtainable through [`Plan::confirm`]
#[derive(Debug, Clone)]
pub struct ConfirmedPlan {
    source_label_id: String,
    moves: Vec<Move>,
}

impl ConfirmedPlan {
    pub fn message_count(&self) -> usize {
        self.moves.iter().map(|m| m.messages.len()).sum()
    }
}

pub struct Reconciler {
    client: Box<dyn MailboxClient>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(client: Box<dyn MailboxClient>, settings: ReconcileSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Source folder for a pass, looked up by exact name
    pub fn resolve_source(&self, pass: Pass, labels: &[LabelInfo]) -> Option<LabelInfo> {
        match pass {
            Pass::Triage => Some(LabelInfo {
                id: INBOX_LABEL_ID.to_string(),
                name: INBOX_LABEL_ID.to_string(),
            }),
            Pass::Reclassify => {
                let name = EmailCategory::CATCH_ALL.label_name(self.settings.naming);
                labels.iter().find(|l| l.name == name).cloned()
            }
        }
    }

    /// List ids under a label, following at most `max_pages` pages
    pub async fn fetch_message_ids(&self, label_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self
                .client
                .list_messages(label_id, self.settings.page_size, page_token.take())
                .await?;
            pages += 1;
            ids.extend(page.ids);

            match page.next_page_token {
                Some(next) if self.settings.max_pages == 0 || pages < self.settings.max_pages => {
                    page_token = Some(next);
                }
                Some(_) => {
                    warn!(
                        "Stopped after {} page(s); {} holds more messages than this run will sort",
                        pages, label_id
                    );
                    break;
                }
                None => break,
            }
        }

        debug!("Fetched {} ids from {} page(s)", ids.len(), pages);
        Ok(ids)
    }

    /// Fetch sender and subject for each id; output order matches `ids`
    pub async fn enrich(
        &self,
        ids: Vec<String>,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<Message>> {
        let total = ids.len();
        let interval = self.settings.progress_interval.max(1);
        let client = &self.client;

        let fetches = stream::iter(ids)
            .map(|id| async move { client.get_message_metadata(&id).await })
            .buffered(self.settings.max_concurrent_requests.max(1));
        let mut fetches = std::pin::pin!(fetches);

        let mut messages = Vec::with_capacity(total);
        while let Some(result) = fetches.next().await {
            messages.push(result?);

            let done = messages.len();
            if let Some(callback) = &progress {
                callback(done, total);
            }
            if done % interval == 0 {
                info!("Processed {}/{} messages", done, total);
            }
        }

        Ok(messages)
    }

    /// Map each category in the grouping to a folder, creating missing ones
    /// unless this is a dry run
    pub async fn resolve_labels(
        &self,
        grouping: &Grouping,
        existing: &[LabelInfo],
    ) -> Result<Vec<ResolvedLabel>> {
        let by_name: HashMap<&str, &str> = existing
            .iter()
            .map(|l| (l.name.as_str(), l.id.as_str()))
            .collect();

        let mut resolved = Vec::new();
        for category in grouping.categories() {
            let name = category.label_name(self.settings.naming);

            let label = if let Some(id) = by_name.get(name) {
                debug!("Folder '{}' already exists", name);
                ResolvedLabel {
                    category,
                    name: name.to_string(),
                    id: Some(id.to_string()),
                    status: LabelStatus::Existing,
                }
            } else if self.settings.create_missing_labels {
                let created = self.client.create_label(name).await.map_err(|e| {
                    TriageError::LabelError(format!("Failed to create folder '{}': {}", name, e))
                })?;
                info!("Created folder '{}' ({})", created.name, created.id);
                ResolvedLabel {
                    category,
                    name: name.to_string(),
                    id: Some(created.id),
                    status: LabelStatus::Created,
                }
            } else {
                ResolvedLabel {
                    category,
                    name: name.to_string(),
                    id: None,
                    status: LabelStatus::Pending,
                }
            };

            resolved.push(label);
        }

        Ok(resolved)
    }

    /// Everything up to the preview: source, fetch, enrich, group, folders
    pub async fn plan(
        &self,
        pass: Pass,
        progress: Option<ProgressCallback>,
    ) -> Result<PlanOutcome> {
        let labels = self.client.list_labels().await?;

        let source = match self.resolve_source(pass, &labels) {
            Some(source) => source,
            None => {
                return Ok(PlanOutcome::SourceMissing {
                    label_name: EmailCategory::CATCH_ALL
                        .label_name(self.settings.naming)
                        .to_string(),
                })
            }
        };

        let ids = self.fetch_message_ids(&source.id).await?;
        info!("Found {} messages in {}", ids.len(), source.name);
        if ids.is_empty() {
            return Ok(PlanOutcome::Empty { source });
        }

        let messages = self.enrich(ids, progress).await?;
        let scanned = messages.len();

        let grouping = Grouping::build(messages, pass.rule_set(), pass.current_category());
        info!(
            "Classified {} messages: {} to move, {} staying",
            scanned,
            grouping.message_count(),
            grouping.retained()
        );
        if grouping.is_empty() {
            return Ok(PlanOutcome::NothingToMove { source, scanned });
        }

        let resolved = self.resolve_labels(&grouping, &labels).await?;

        Ok(PlanOutcome::Ready(Plan {
            pass,
            source,
            scanned,
            grouping,
            labels: resolved,
            naming: self.settings.naming,
        }))
    }

    /// Move every message: add its folder label, drop the source label
    ///
    /// Stops at the first failure. Messages moved before it stay moved.
    pub async fn apply(&self, plan: ConfirmedPlan) -> Result<RunStats> {
        let mut stats = RunStats::new();
        let remove = vec![plan.source_label_id.clone()];

        for mv in &plan.moves {
            let add = vec![mv.label_id.clone()];
            for message in &mv.messages {
                if let Err(e) = self.client.modify_labels(&message.id, &add, &remove).await {
                    warn!(
                        "Stopped after moving {} of {} messages: {}",
                        stats.total(),
                        plan.message_count(),
                        e
                    );
                    return Err(e);
                }
                stats.record(mv.category);
            }
            info!("Moved {} messages to {}", mv.messages.len(), mv.category);
        }

        Ok(stats)
    }
}
