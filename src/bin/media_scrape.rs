use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reddit_media_engine::config::{self, ScrapeConfig};
use reddit_media_engine::http::HttpAgents;
use reddit_media_engine::paths::AppPaths;
use reddit_media_engine::reddit::{Credentials, RedditClient, RedditEndpoints};
use reddit_media_engine::resolve::{ExistingFilePolicy, ResolveContext};
use reddit_media_engine::scanner;
use reddit_media_engine::sources::{self, Source};
use reddit_media_engine::EngineError;

/// Download recent media posted to subreddits and by users.
#[derive(Parser)]
#[command(name = "media_scrape")]
#[command(about = "Scan subreddits and user profiles and save linked media", long_about = None)]
struct Cli {
    /// Base directory holding config/ and data/
    #[arg(long, env = "MEDIA_SCRAPE_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Subreddit list (defaults to data/subreddits.csv)
    #[arg(long)]
    forums: Option<PathBuf>,

    /// User list (defaults to data/users.csv)
    #[arg(long)]
    users: Option<PathBuf>,

    /// Where media is written (defaults to data/downloads)
    #[arg(long)]
    download_dir: Option<String>,

    /// Successful downloads wanted per source
    #[arg(long)]
    target: Option<usize>,

    /// Posts requested per source
    #[arg(long)]
    max_posts: Option<usize>,

    /// Hard ceiling on posts examined per source
    #[arg(long)]
    safety_limit: Option<usize>,

    /// Comma-separated media allow-list, e.g. jpg,png,mp4 (empty disables filtering)
    #[arg(long, value_delimiter = ',')]
    formats: Option<Vec<String>>,

    /// Keep files that already exist instead of overwriting them
    #[arg(long)]
    skip_existing: bool,

    /// Only scan the subreddit list
    #[arg(long, conflicts_with = "users_only")]
    forums_only: bool,

    /// Only scan the user list
    #[arg(long)]
    users_only: bool,

    /// Save the effective settings to config/scrape.json before scanning
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ScrapeConfig) {
        if let Some(dir) = &self.download_dir {
            config.download_dir = Some(dir.clone());
        }
        if let Some(target) = self.target {
            config.target_per_source = target;
        }
        if let Some(max_posts) = self.max_posts {
            config.max_posts_per_source = max_posts;
        }
        if let Some(safety_limit) = self.safety_limit {
            config.safety_limit = safety_limit;
        }
        if let Some(formats) = &self.formats {
            config.supported_formats = formats.clone();
        }
        if self.skip_existing {
            config.existing_files = ExistingFilePolicy::Skip;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "media scrape aborted");
            eprintln!("error: {err}");
            match err {
                EngineError::Authentication(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: &Cli) -> Result<(), EngineError> {
    let paths = AppPaths::new(cli.base_dir.clone());
    let mut scrape_config = config::load_scrape_config(&paths)?;
    cli.apply_overrides(&mut scrape_config);
    if cli.write_config {
        config::save_scrape_config(&paths, &scrape_config)?;
    }
    paths.ensure_dirs(&scrape_config)?;

    let credentials = Credentials::from_env()?;
    let client = RedditClient::authenticate(&credentials, RedditEndpoints::default())?;

    let mut source_list: Vec<Source> = Vec::new();
    if !cli.users_only {
        let path = cli.forums.clone().unwrap_or_else(|| paths.forum_list_path());
        source_list.extend(sources::load_forum_list(&path)?);
    }
    if !cli.forums_only {
        let path = cli.users.clone().unwrap_or_else(|| paths.user_list_path());
        source_list.extend(sources::load_user_list(&path)?);
    }

    let download_dir = paths.effective_download_dir(&scrape_config);
    let http = HttpAgents::new(scrape_config.timeouts());
    let formats = scrape_config.formats();
    let ctx = ResolveContext {
        http: &http,
        credentials: &credentials,
        destination_dir: &download_dir,
        formats: &formats,
        existing_files: scrape_config.existing_files,
    };

    info!(
        sources = source_list.len(),
        download_dir = %download_dir.display(),
        "starting scan"
    );

    let summaries = scanner::run_sources(
        &client,
        &ctx,
        &source_list,
        scrape_config.limits(),
        |source, saved| {
            println!(
                "  {} [{}/{}] {} -> {}",
                source.label(),
                saved.index,
                saved.target,
                saved.post_url,
                saved.path.display()
            );
        },
    );

    println!();
    for summary in &summaries {
        println!("{summary}");
    }
    let total: usize = summaries.iter().map(|s| s.saved).sum();
    println!("Complete: saved {total} media items from {} sources", summaries.len());
    Ok(())
}
