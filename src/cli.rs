//! Command-line interface and pass orchestration

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::CredentialProvider;
use crate::classifier::{Field, Rule, RuleSet};
use crate::client::ProductionGmailClient;
use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::grouping::{PreviewEntry, RunStats};
use crate::models::EmailCategory;
use crate::reconciler::{
    Confirmation, LabelStatus, Pass, Plan, PlanOutcome, ProgressCallback, ReconcileSettings,
    Reconciler,
};

#[derive(Parser, Debug)]
#[command(name = "inbox-triage")]
#[command(version = "0.1.0")]
#[command(about = "Sort Gmail messages into category folders by keyword rules", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".inbox-triage/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Sort the inbox into category folders
    Triage {
        /// Show the preview only; create no folders and move nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-sort the catch-all folder with the specific rules
    Reclassify {
        /// Show the preview only; create no folders and move nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify a single sender/subject pair without touching the mailbox
    Classify {
        #[arg(long)]
        from: String,

        #[arg(long)]
        subject: String,

        /// Use the reclassify rule set
        #[arg(long)]
        reclassify: bool,
    },

    /// Print the rule table in evaluation order
    Rules {
        /// Show the reclassify rule set
        #[arg(long)]
        reclassify: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share a MultiProgress with the tracing writer so log lines print above bars
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        self.println(format!("  ✓ {}", msg));
    }

    pub fn println(&self, line: impl AsRef<str>) {
        let _ = self.multi.println(line);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    SourceMissing { label_name: String },
    Empty,
    NothingToMove,
    /// Dry run stopped after the preview
    Previewed,
    Cancelled,
    Applied,
}

/// Summary of one triage or reclassify run
#[derive(Debug, Clone)]
pub struct Report {
    pub run_id: String,
    pub pass: Pass,
    pub dry_run: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub duration_seconds: i64,
    pub source: String,
    pub scanned: usize,
    pub retained: usize,
    pub labels_created: Vec<String>,
    pub labels_pending: Vec<String>,
    /// Folder each category was resolved to
    pub folders: Vec<(EmailCategory, String)>,
    pub moved: RunStats,
    pub outcome: RunOutcome,
}

impl Report {
    pub fn new(pass: Pass, dry_run: bool) -> Self {
        let now = chrono::Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            pass,
            dry_run,
            started_at: now,
            completed_at: now,
            duration_seconds: 0,
            source: String::new(),
            scanned: 0,
            retained: 0,
            labels_created: Vec::new(),
            labels_pending: Vec::new(),
            folders: Vec::new(),
            moved: RunStats::new(),
            outcome: RunOutcome::Empty,
        }
    }

    /// Record what planning found
    pub fn record_plan(&mut self, plan: &Plan) {
        self.source = plan.source.name.clone();
        self.scanned = plan.scanned;
        self.retained = plan.grouping.retained();
        self.labels_created = plan
            .labels_with_status(LabelStatus::Created)
            .into_iter()
            .map(|l| l.name.clone())
            .collect();
        self.folders = plan
            .labels
            .iter()
            .map(|l| (l.category, l.name.clone()))
            .collect();
        self.labels_pending = plan
            .labels_with_status(LabelStatus::Pending)
            .into_iter()
            .map(|l| l.name.clone())
            .collect();
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.completed_at = chrono::Utc::now();
        self.duration_seconds = (self.completed_at - self.started_at).num_seconds();
    }

    /// Folder name for a category, falling back to the category name
    pub fn folder_name(&self, category: EmailCategory) -> &str {
        self.folders
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, name)| name.as_str())
            .unwrap_or_else(|| category.name())
    }

    /// Closing lines printed by the binary
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        match &self.outcome {
            RunOutcome::SourceMissing { label_name } => {
                lines.push(format!(
                    "Folder '{}' does not exist; nothing to reclassify.",
                    label_name
                ));
                return lines;
            }
            RunOutcome::Empty => {
                lines.push(format!("{} is empty. Nothing to do.", self.source));
                return lines;
            }
            RunOutcome::NothingToMove => {
                lines.push(format!(
                    "Scanned {} messages in {}; every one stays where it is.",
                    self.scanned, self.source
                ));
                return lines;
            }
            RunOutcome::Cancelled => {
                lines.push("Cancelled. No messages were moved.".to_string());
                return lines;
            }
            RunOutcome::Previewed | RunOutcome::Applied => {}
        }

        lines.push("========================================".to_string());
        if self.dry_run {
            lines.push("Dry Run Summary".to_string());
        } else {
            lines.push("Run Summary".to_string());
        }
        lines.push("========================================".to_string());
        lines.push(format!("Run ID: {}", self.run_id));
        lines.push(format!("Source: {}", self.source));
        lines.push(format!("Duration: {} seconds", self.duration_seconds));
        lines.push(format!("Messages scanned: {}", self.scanned));
        if self.pass == Pass::Reclassify {
            lines.push(format!("Messages left in place: {}", self.retained));
        }
        if !self.labels_created.is_empty() {
            lines.push(format!("Folders created: {}", self.labels_created.join(", ")));
        }
        if !self.labels_pending.is_empty() {
            lines.push(format!(
                "Folders that would be created: {}",
                self.labels_pending.join(", ")
            ));
        }

        if self.outcome == RunOutcome::Applied {
            for (category, count) in self.moved.iter() {
                lines.push(format!(
                    "  ✓ {}: {} messages moved",
                    self.folder_name(category),
                    count
                ));
            }
            lines.push(format!("Messages moved: {}", self.moved.total()));
        } else {
            lines.push("No changes were made. Run without --dry-run to apply.".to_string());
        }
        lines.push("========================================".to_string());

        lines
    }
}

/// Run the consent flow and return the connected account address
pub async fn run_auth(cli: &Cli, force: bool) -> Result<String> {
    let provider = CredentialProvider::new(&cli.credentials, &cli.token_cache);
    let hub = provider.authenticate(force).await?;
    let client = ProductionGmailClient::new(hub);
    client.account_email().await
}

/// Load config and the cached token, then plan, preview, confirm and apply
pub async fn run_pass(cli: &Cli, pass: Pass, dry_run: bool, multi: MultiProgress) -> Result<Report> {
    let reporter = ProgressReporter::with_multi_progress(multi);

    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = Config::load(&cli.config).await?;
    reporter.finish_spinner(&config_spinner, "Configuration loaded");

    let provider = CredentialProvider::new(&cli.credentials, &cli.token_cache);
    provider.ensure_cached()?;

    let auth_spinner = reporter.add_spinner("Connecting to Gmail API...");
    let hub = provider.connect().await?;
    let client = ProductionGmailClient::with_timeout(
        hub,
        Duration::from_secs(config.scan.request_timeout_secs),
    );
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated");

    let reconciler = Reconciler::new(
        Box::new(client),
        ReconcileSettings::from_config(&config, dry_run),
    );

    execute_pass(&reconciler, &config, pass, &reporter, prompt_confirmation).await
}

/// Drive a reconciler through one pass
///
/// `prompt` is asked for the operator's answer after the preview; it is not
/// called on a dry run or when planning ends early.
pub async fn execute_pass<P>(
    reconciler: &Reconciler,
    config: &Config,
    pass: Pass,
    reporter: &ProgressReporter,
    prompt: P,
) -> Result<Report>
where
    P: FnOnce(&ProgressReporter, &str) -> Result<String>,
{
    let dry_run = !reconciler.settings().create_missing_labels;
    let mut report = Report::new(pass, dry_run);
    info!("Starting {:?} run {}", pass, report.run_id);

    let pb = reporter.add_progress_bar(0, "Reading message headers");
    let bar = pb.clone();
    let progress: ProgressCallback = Arc::new(move |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    });

    let outcome = reconciler.plan(pass, Some(progress)).await;
    pb.finish_and_clear();

    let plan = match outcome? {
        PlanOutcome::SourceMissing { label_name } => {
            report.finish(RunOutcome::SourceMissing { label_name });
            return Ok(report);
        }
        PlanOutcome::Empty { source } => {
            report.source = source.name;
            report.finish(RunOutcome::Empty);
            return Ok(report);
        }
        PlanOutcome::NothingToMove { source, scanned } => {
            report.source = source.name;
            report.scanned = scanned;
            report.finish(RunOutcome::NothingToMove);
            return Ok(report);
        }
        PlanOutcome::Ready(plan) => plan,
    };

    report.record_plan(&plan);
    print_statistics(reporter, &plan);
    print_preview(
        reporter,
        &plan.preview(
            config.execution.preview_samples,
            config.execution.subject_width,
        ),
        config.execution.preview_samples,
    );

    if dry_run {
        report.finish(RunOutcome::Previewed);
        return Ok(report);
    }

    reporter.println("");
    reporter.println(format!(
        "⚠️  This will move {} messages out of {} into the folders above!",
        plan.grouping.message_count(),
        plan.source.name
    ));
    let answer = prompt(reporter, &config.execution.confirm_word)?;

    let confirmed = match plan.confirm(&answer, &config.execution.confirm_word)? {
        Confirmation::Confirmed(confirmed) => confirmed,
        Confirmation::Cancelled => {
            report.finish(RunOutcome::Cancelled);
            return Ok(report);
        }
    };

    let move_bar = reporter.add_spinner(&format!(
        "Moving {} messages...",
        confirmed.message_count()
    ));
    let result = reconciler.apply(confirmed).await;
    move_bar.finish_and_clear();

    report.moved = result?;
    report.finish(RunOutcome::Applied);
    Ok(report)
}

/// Read the operator's answer from stdin
pub fn prompt_confirmation(reporter: &ProgressReporter, confirm_word: &str) -> Result<String> {
    reporter.multi_progress().suspend(|| {
        print!("Type {} to proceed: ", confirm_word);
        let _ = std::io::Write::flush(&mut std::io::stdout());
    });

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input)
}

/// Category counts, largest first
pub fn print_statistics(reporter: &ProgressReporter, plan: &Plan) {
    reporter.println("");
    reporter.println("========================================");
    reporter.println("Classification Statistics");
    reporter.println("========================================");
    for (category, count) in plan.grouping.counts_by_size() {
        let name = plan
            .label_for(category)
            .map(|l| l.name.as_str())
            .unwrap_or_else(|| category.name());
        reporter.println(format!("  {:30} {:4} messages", name, count));
    }
    if plan.grouping.retained() > 0 {
        reporter.println(format!(
            "  {:30} {:4} messages",
            "(staying in place)",
            plan.grouping.retained()
        ));
    }
}

pub fn print_preview(reporter: &ProgressReporter, entries: &[PreviewEntry], samples: usize) {
    reporter.println("");
    reporter.println("========================================");
    reporter.println("Preview");
    reporter.println("========================================");
    for entry in entries {
        reporter.println(format!("\n  {}: {} messages", entry.label_name, entry.count));
        for subject in &entry.sample_subjects {
            reporter.println(format!("      • {}", subject));
        }
        if entry.remaining > 0 && samples > 0 {
            reporter.println(format!("      ... and {} more", entry.remaining));
        }
    }
}

fn field_name(field: Field) -> &'static str {
    match field {
        Field::Sender => "from",
        Field::Subject => "subject",
        Field::Either => "from|subject",
    }
}

/// One line per rule: position, category and matchers
pub fn format_rule(position: usize, rule: &Rule) -> String {
    let matchers: Vec<String> = rule
        .matchers
        .iter()
        .map(|m| format!("{}: {}", field_name(m.field), m.keywords.join(", ")))
        .collect();
    format!("{:2}. {:24} {}", position, rule.category.name(), matchers.join("; "))
}

pub fn rule_table(rule_set: RuleSet) -> Vec<String> {
    rule_set
        .rules()
        .iter()
        .enumerate()
        .map(|(i, rule)| format_rule(i + 1, rule))
        .collect()
}

/// Error returned when init-config would clobber a file
pub fn config_exists_error(path: &std::path::Path) -> TriageError {
    TriageError::ConfigError(format!(
        "Configuration file already exists at {:?}. Use --force to overwrite.",
        path
    ))
}
