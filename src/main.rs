mod config;
mod generation;
mod github;
mod output;
mod pipeline;
mod prompt;
mod publish;
mod validate;

use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, info_span};
use tracing_subscriber::EnvFilter;

use generation::OpenAiGenerator;
use github::GitHubClient;
use pipeline::{Pipeline, RunError, RunOptions};

/// readme-updater: proposes a README update for a GitHub Pull Request and
/// opens it as a new Pull Request against the default branch.
///
/// Reads AUTH_TOKEN, REPO_PATH, PR_NUMBER and OPENAI_API_KEY from the environment.
#[derive(Parser, Debug)]
#[command(name = "readme-updater", version, about)]
struct Cli {
    /// Config file (defaults to .readme-updater.toml in the current directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generate the proposal but don't create a branch or pull request
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, write the proposed README to this file instead of stdout
    #[arg(short, long, requires = "dry_run")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), RunError> {
    info!("loading configuration");
    let settings = config::Config::load(cli.config.as_deref())?
        .validate(|key| std::env::var(key).ok())?;

    let _main_span =
        info_span!("readme_update", repo = %settings.repo, pr = settings.pr_number).entered();
    debug!(model = %settings.generation.model, readme = %settings.readme_path, "configuration loaded");

    let repo = GitHubClient::new(
        &settings.api_url,
        settings.repo.clone(),
        settings.token.clone(),
    )?;
    let generator = OpenAiGenerator::new(&settings.generation)?;

    let options = RunOptions::from_settings(&settings, cli.dry_run);
    let pipeline = Pipeline::new(&repo, &generator, options);
    let outcome = pipeline.run(Utc::now()).await?;

    output::emit(&outcome, cli.output.as_deref())?;
    info!("done");
    Ok(())
}
