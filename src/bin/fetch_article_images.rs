use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use article_images::classify::ScanStrategy;
use article_images::config::{load_config_or_default, FetchConfig};
use article_images::fetch::HttpFetcher;
use article_images::paths::{validate_slug, AssetPaths, DEFAULT_ASSET_ROOT};
use article_images::pipeline::{dry_run, run_article, ArticleJob, RunOutcome};

/// Downloads the content images of one article page and writes an image-mapping manifest.
#[derive(Parser)]
#[command(name = "fetch_article_images", version, about)]
struct Cli {
    /// Article page URL
    article_url: String,

    /// Article slug, used for file names and the manifest name
    article_slug: String,

    /// Asset root receiving articles/featured and articles/main-content
    #[arg(long, env = "ARTICLE_IMAGES_ASSET_ROOT", default_value = DEFAULT_ASSET_ROOT)]
    asset_root: PathBuf,

    /// Directory for image-mapping-<slug>.json
    #[arg(long, env = "ARTICLE_IMAGES_MANIFEST_DIR", default_value = ".")]
    manifest_dir: PathBuf,

    /// JSON config file (classifier lists, naming, featured policy, user agent)
    #[arg(long, env = "ARTICLE_IMAGES_CONFIG")]
    config: Option<PathBuf>,

    /// Markup scanning strategy: structural or pattern
    #[arg(long)]
    strategy: Option<ScanStrategy>,

    /// Extra topical keyword that marks a URL as article content (repeatable)
    #[arg(long = "allow", value_name = "KEYWORD")]
    allow: Vec<String>,

    /// Classify and print verdicts without downloading anything
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(code) => return ExitCode::from(code),
    };

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let slug = match validate_slug(&cli.article_slug) {
        Ok(slug) => slug,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let job = ArticleJob::new(&cli.article_url, &slug);
    let fetcher = HttpFetcher::from_config(&config);

    if cli.dry_run {
        match dry_run(&job, &config, &fetcher) {
            Ok(verdicts) => {
                for (url, verdict) in verdicts {
                    let mark = if verdict.is_accept() { "keep" } else { "skip" };
                    println!("{mark}\t{url}\t{verdict:?}");
                }
            }
            Err(err) => tracing::error!(url = %job.article_url, error = %err, "article_page_fetch_failed"),
        }
        return ExitCode::SUCCESS;
    }

    let paths = AssetPaths::new(cli.asset_root.clone(), cli.manifest_dir.clone());
    let report = run_article(&job, &config, &paths, &fetcher);
    match report.outcome {
        RunOutcome::Completed => {
            println!(
                "Downloaded {}/{} content image(s) for {}",
                report.manifest.images.len(),
                report.candidates,
                job.slug
            );
            if let Some(path) = &report.manifest_path {
                println!("Manifest: {}", path.to_string_lossy());
            }
        }
        RunOutcome::PageUnavailable => println!("Could not fetch {}", job.article_url),
        RunOutcome::NoImages => println!("No content images found in article."),
    }

    ExitCode::SUCCESS
}

/// Parses the command line; `Err` carries the exit code (0 after help or version output).
fn parse_args<I, T>(args: I) -> Result<Cli, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(err) => {
            let _ = err.print();
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                return Err(0);
            }
            print_usage();
            Err(1)
        }
    }
}

fn build_config(cli: &Cli) -> article_images::Result<FetchConfig> {
    let mut config = load_config_or_default(cli.config.as_deref())?;
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    config.classifier = config.classifier.with_allowed(&cli.allow);
    Ok(config)
}

fn print_usage() {
    eprintln!(
        r#"
Usage: fetch_article_images <ARTICLE_URL> <ARTICLE_SLUG> [options]

Example:
  fetch_article_images https://bizee.com/articles/can-a-minor-own-a-business can-a-minor-own-a-business

Run with --help for all options."#
    );
}
