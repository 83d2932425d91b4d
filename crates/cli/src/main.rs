use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use showsync_client::{CatalogClient, ClientConfig, ShowInclude, UpdateOptions, catalog_url_for_show};
use showsync_core::Show;
use showsync_core::ordering::show_cmp;
use showsync_store::{FileStore, Library};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "showsync")]
#[command(about = "Keep a local library of TV shows in sync with the catalog", long_about = None)]
struct Cli {
    /// Library file
    #[arg(long, env = "SHOWSYNC_LIBRARY", default_value = "showsync-library.json")]
    library: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog by show name
    Search { name: String },
    /// Fetch shows by id and add them to the library
    Add {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Refresh the shows in the library
    Update {
        /// Update every show, not only those changed since the last update
        #[arg(long)]
        force: bool,
        #[arg(long)]
        no_episodes: bool,
        #[arg(long)]
        no_images: bool,
        #[arg(long)]
        no_actors: bool,
        /// Take banner, poster and fanart from the catalog
        #[arg(long)]
        replace_artwork: bool,
    },
    /// List the library, soonest airing first
    List,
    /// List the episodes of a show in the library
    Episodes { show_id: String },
    /// Mark every episode up to and including this one as seen
    Seen {
        show_id: String,
        season: u32,
        episode: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let library = Library::new(FileStore::new(&cli.library));
    info!(library = %cli.library.display(), "using library");

    match cli.command {
        Command::Search { name } => {
            let client = client()?;
            let shows = client.shows_with_name(&name).await.context("search failed")?;
            if shows.is_empty() {
                println!("no shows named {name:?}");
            }
            for show in &shows {
                let year = show
                    .premiere_date()
                    .map(|d| d.format("%Y").to_string())
                    .unwrap_or_else(|| "????".into());
                println!("{:>8}  {year}  {}  {}", show.id(), show.name(), catalog_url_for_show(show));
            }
        }
        Command::Add { ids } => {
            let client = client()?;
            let mut shows = load(&library).await?;
            let outcome = client
                .shows_with_ids(&ids, ShowInclude::all())
                .await
                .context("invalid show ids")?;

            for (id, err) in &outcome.errors {
                warn!(show_id = %id, error = %err, "could not fetch show");
            }
            let mut added = 0;
            for show in outcome.into_results() {
                if shows.iter().any(|s| s.id() == show.id()) {
                    println!("{} is already in the library", show.name());
                    continue;
                }
                println!("added {} ({} episodes)", show.name(), show.episodes().len());
                shows.push(show);
                added += 1;
            }
            if added > 0 {
                library.save(&shows).await.context("failed to save library")?;
            }
        }
        Command::Update {
            force,
            no_episodes,
            no_images,
            no_actors,
            replace_artwork,
        } => {
            let client = client()?;
            let watermark_path = watermark_path(&cli.library);
            client.set_last_update_timestamp(read_watermark(&watermark_path).await?);

            let mut shows = load(&library).await?;
            let opts = UpdateOptions {
                check_if_needed: !force,
                episodes: !no_episodes,
                images: !no_images,
                actors: !no_actors,
                replace_artwork,
            };
            let report = client.update_shows_report(&mut shows, opts).await;
            for show in &mut shows {
                show.refresh_episode_information();
            }
            library.save(&shows).await.context("failed to save library")?;

            for (id, err) in report.failures() {
                println!("{id}: {err}");
            }
            if !report.succeeded() {
                bail!("some shows failed to update; watermark left unchanged");
            }
            let watermark = client
                .refresh_last_update_timestamp()
                .await
                .context("failed to read the catalog clock; watermark left unchanged")?;
            tokio::fs::write(&watermark_path, watermark.to_string())
                .await
                .with_context(|| format!("failed to write {}", watermark_path.display()))?;
            println!("{} shows up to date", shows.len());
        }
        Command::List => {
            let mut shows = load(&library).await?;
            shows.sort_by(show_cmp);
            for show in &shows {
                let next = match (show.next_episode(), show.days_to_next_episode()) {
                    (Some(ep), Some(days)) => format!(
                        "next S{:02}E{:02} in {days}d",
                        ep.season_number(),
                        ep.episode_number()
                    ),
                    _ => String::from("-"),
                };
                println!(
                    "{:>8}  {:<40} {:<9} {:<20} {} behind",
                    show.id(),
                    show.name(),
                    show.status().as_str(),
                    next,
                    show.number_of_episodes_behind()
                );
            }
        }
        Command::Episodes { show_id } => {
            let shows = load(&library).await?;
            let Some(show) = shows.iter().find(|s| s.id() == show_id) else {
                bail!("show {show_id} is not in the library");
            };
            let specials_in_order = ClientConfig::from_env().include_specials;
            for ep in show.episodes_ordered(specials_in_order) {
                let aired = ep
                    .aired_date()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "TBA".into());
                println!(
                    "S{:02}E{:02}  {aired:<10}  {}  {}",
                    ep.season_number(),
                    ep.episode_number(),
                    if ep.seen() { "x" } else { " " },
                    ep.title().unwrap_or("")
                );
            }
        }
        Command::Seen {
            show_id,
            season,
            episode,
        } => {
            let mut shows = load(&library).await?;
            let Some(show) = shows.iter_mut().find(|s| s.id() == show_id) else {
                bail!("show {show_id} is not in the library");
            };
            if show.episode_by_number(season, episode).is_none() {
                bail!("{} has no episode S{season:02}E{episode:02}", show.name());
            }
            show.mark_seen_through(season, episode);
            show.refresh_episode_information();
            println!(
                "{}: {} episodes behind",
                show.name(),
                show.number_of_episodes_behind()
            );
            library.save(&shows).await.context("failed to save library")?;
        }
    }

    Ok(())
}

fn client() -> anyhow::Result<CatalogClient> {
    let config = ClientConfig::from_env();
    if config.api_key.is_empty() {
        bail!("SHOWSYNC_API_KEY is not set");
    }
    CatalogClient::with_http(config).context("failed to build catalog client")
}

async fn load(library: &Library<FileStore>) -> anyhow::Result<Vec<Show>> {
    let report = library.load().await.context("failed to load library")?;
    if !report.is_clean() {
        warn!(skipped = report.errors.len(), "some shows could not be read and will be dropped on save");
    }
    Ok(report.entities)
}

fn watermark_path(library: &Path) -> PathBuf {
    let mut name = library.as_os_str().to_owned();
    name.push(".watermark");
    PathBuf::from(name)
}

async fn read_watermark(path: &Path) -> anyhow::Result<Option<i64>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("corrupt watermark in {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}
