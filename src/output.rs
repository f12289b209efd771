use colored::Colorize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::pipeline::Outcome;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write proposal file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Report the outcome of a run.
///
/// A published run prints a summary to the terminal. A dry run prints the
/// proposed README to stdout, or writes it to `output_path` when given.
#[instrument(skip(outcome))]
pub fn emit(outcome: &Outcome, output_path: Option<&Path>) -> Result<(), OutputError> {
    match (outcome, output_path) {
        (Outcome::Published { .. }, _) => {
            debug!("writing summary to terminal");
            println!("{}", format_summary(outcome));
            Ok(())
        }
        (Outcome::DryRun { readme, .. }, Some(path)) => {
            debug!(path = %path.display(), "writing proposal to file");
            fs::write(path, readme)?;
            eprintln!("{}", format_summary(outcome));
            Ok(())
        }
        (Outcome::DryRun { readme, .. }, None) => {
            debug!("writing proposal to stdout");
            eprintln!("{}", format_summary(outcome));
            print!("{readme}");
            Ok(())
        }
    }
}

/// Terminal summary of a run:
///
/// PR #7: "Add widget export"
/// Branch: readme-update/pr-7-20261019083005 | Commit: 1a2b3c4
/// ═══ Opened PR #8 ═══
/// https://github.com/octo/widgets/pull/8
fn format_summary(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Published { source, result } => format!(
            "\nPR #{}: \"{}\"\nBranch: {} | Commit: {}\n{} {} {}\n{}\n",
            source.number,
            source.title,
            result.branch,
            short_sha(&result.commit),
            "═══".green(),
            format!("Opened PR #{}", result.pull_request.number).green().bold(),
            "═══".green(),
            result.pull_request.html_url,
        ),
        Outcome::DryRun {
            source,
            base,
            readme,
        } => format!(
            "\nPR #{}: \"{}\"\nBase: {} | Proposed README: {} bytes\n{}\n",
            source.number,
            source.title,
            base,
            readme.len(),
            "═══ Dry run: nothing was published ═══".yellow().bold(),
        ),
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
