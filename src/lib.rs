//! Inbox Triage
//!
//! Sorts a Gmail mailbox into category folders with a fixed, ordered table of
//! keyword rules over each message's sender and subject.
//!
//! # Overview
//!
//! - **Triage**: classify every message in the inbox and move it into its
//!   category folder
//! - **Reclassify**: re-run the specific rules over the catch-all folder and
//!   move whatever now matches; the rest stays put
//!
//! Both passes preview the result and move nothing until the operator types
//! the confirmation word.
//!
//! # Example Usage
//!
//! ```no_run
//! use inbox_triage::auth::CredentialProvider;
//! use inbox_triage::client::ProductionGmailClient;
//! use inbox_triage::config::Config;
//! use inbox_triage::reconciler::{Pass, PlanOutcome, ReconcileSettings, Reconciler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let provider = CredentialProvider::new("credentials.json", ".inbox-triage/token.json");
//!     let client = ProductionGmailClient::new(provider.connect().await?);
//!
//!     let reconciler = Reconciler::new(
//!         Box::new(client),
//!         ReconcileSettings::from_config(&config, true),
//!     );
//!     if let PlanOutcome::Ready(plan) = reconciler.plan(Pass::Triage, None).await? {
//!         for entry in plan.preview(5, 60) {
//!             println!("{}: {}", entry.label_name, entry.count);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 consent flow and token cache
//! - [`client`] - Gmail API client behind the [`MailboxClient`] trait
//! - [`classifier`] - Ordered keyword rules
//! - [`cli`] - Command-line interface and pass orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`grouping`] - Category buckets, preview rows and move counts
//! - [`models`] - Core data structures
//! - [`reconciler`] - Plan, confirm and apply a pass

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod grouping;
pub mod models;
pub mod reconciler;

pub use error::{Result, TriageError};

pub use models::{EmailCategory, LabelInfo, LabelNaming, Message, MessagePage};

pub use classifier::{classify, RuleSet};

pub use config::{Config, ExecutionConfig, LabelConfig, ScanConfig};

pub use client::{MailboxClient, ProductionGmailClient};

pub use grouping::{Grouping, PreviewEntry, RunStats};

pub use reconciler::{
    Confirmation, ConfirmedPlan, Pass, Plan, PlanOutcome, ReconcileSettings, Reconciler,
};

pub use cli::{Cli, Commands, ProgressReporter, Report};
