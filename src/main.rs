use anyhow::Result;
use clap::Parser;
use inbox_triage::cli::{self, Cli, Commands};
use inbox_triage::config::Config;
use inbox_triage::error::TriageError;
use inbox_triage::reconciler::Pass;
use inbox_triage::RuleSet;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl MultiProgressMakeWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: inbox-triage --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // On Windows use ring (no NASM/CMake needed); elsewhere aws-lc-rs
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inbox_triage=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inbox_triage=info,warn,error"))
    };

    let multi_progress = Arc::new(MultiProgress::new());
    let make_writer = MultiProgressMakeWriter::new(Arc::clone(&multi_progress));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match &cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            let email = cli::run_auth(&cli, *force).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);
            println!("Connected to account: {}", email);

            Ok(())
        }

        Commands::Triage { dry_run } => {
            run_pass_command(&cli, Pass::Triage, *dry_run, &multi_progress).await
        }

        Commands::Reclassify { dry_run } => {
            run_pass_command(&cli, Pass::Reclassify, *dry_run, &multi_progress).await
        }

        Commands::Classify {
            from,
            subject,
            reclassify,
        } => {
            let config = Config::load(&cli.config).await?;
            let rule_set = if *reclassify {
                RuleSet::Reclassify
            } else {
                RuleSet::Full
            };

            let category = rule_set.classify(from, subject);
            println!(
                "{} -> {}",
                category,
                category.label_name(config.labels.naming)
            );

            Ok(())
        }

        Commands::Rules { reclassify } => {
            let rule_set = if *reclassify {
                RuleSet::Reclassify
            } else {
                RuleSet::Full
            };

            for line in cli::rule_table(rule_set) {
                println!("{}", line);
            }
            println!("    Anything else goes to Other");

            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(cli::config_exists_error(output).into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - scan.max_pages: 1 sorts one page of 500 messages, 0 sorts everything");
            println!("  - scan.max_concurrent_requests: parallel header fetches");
            println!("  - labels.naming: 'pl' or 'en' folder names");
            println!("  - execution.confirm_word: the word that unlocks moving messages");

            Ok(())
        }
    }
}

/// Run a triage or reclassify pass and print its summary
///
/// A missing token cache is reported and the command returns normally.
async fn run_pass_command(
    cli: &Cli,
    pass: Pass,
    dry_run: bool,
    multi_progress: &Arc<MultiProgress>,
) -> Result<()> {
    if dry_run {
        println!("Running in DRY RUN mode - no changes will be made");
    }

    match cli::run_pass(cli, pass, dry_run, (**multi_progress).clone()).await {
        Ok(report) => {
            println!();
            for line in report.summary_lines() {
                println!("{}", line);
            }
            Ok(())
        }
        Err(e @ TriageError::MissingCredential { .. }) => {
            println!("{}", e);
            if let Some(hint) = e.hint() {
                println!("   {}", hint);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(hint) = error
        .downcast_ref::<TriageError>()
        .and_then(TriageError::hint)
    {
        eprintln!("\nHint: {}", hint);
    }
}
