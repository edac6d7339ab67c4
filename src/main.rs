use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use factbook::api::{ApiClient, ApiError, FactsApi};
use factbook::config::{Config, ConfigError};
use factbook::logger::{self, Logger};
use factbook::store::{FileStore, KeyValueStore, StoreError};
use factbook::view::{FavoritesView, SortDirection};
use factbook::{FAVORITES_STORAGE_KEY, FactRecord, FavoritesRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no search result with id `{0}`")]
    UnknownSearchId(String),
    #[error("`{0}` is not a favorite")]
    NotAFavorite(String),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "factbook", about = "Random facts with locally persisted favorites")]
struct Cli {
    #[arg(long, env = "FACTBOOK_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "FACTBOOK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a random fact.
    Random {
        #[arg(long)]
        save: bool,
    },
    /// Search the facts API.
    Search {
        query: String,
        /// Favorite the result with this id.
        #[arg(long)]
        save: Option<String>,
    },
    /// List favorites.
    Favorites {
        #[arg(long)]
        filter: Option<String>,
        /// Oldest first.
        #[arg(long)]
        asc: bool,
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Remove a favorite by id.
    Unfavorite { id: String },
    /// Delete all stored favorites.
    Reset,
}

struct App {
    registry: FavoritesRegistry,
    store: Arc<dyn KeyValueStore>,
    api: FactsApi,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.base_url.as_deref(), cli.data_dir);

    let client = ApiClient::new(&config.api_base_url, config.timeouts)?;
    let log: Arc<dyn Logger> = logger::for_environment(config.production, client.http().clone(), &config.log_url);
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
    tracing::debug!(data_dir = %config.data_dir.display(), base_url = %config.api_base_url, "factbook configured");

    let app = App {
        registry: FavoritesRegistry::new(store.clone(), log.clone()),
        store,
        api: FactsApi::new(client),
        json: cli.json,
    };

    let result = match cli.command {
        Command::Random { save } => app.random(save).await,
        Command::Search { query, save } => app.search(&query, save.as_deref()).await,
        Command::Favorites { filter, asc, pages } => app.favorites(filter.as_deref(), asc, pages),
        Command::Unfavorite { id } => app.unfavorite(&id),
        Command::Reset => app.reset(),
    };

    if let Err(CliError::Api(e)) = &result {
        log.error("Error loading facts", e, "factbook");
    }
    logger::flush(log.as_ref()).await;
    result
}

impl App {
    async fn random(&self, save: bool) -> Result<(), CliError> {
        let fact = self.api.random().await?;
        if save {
            self.registry.add(&fact);
        }
        self.print_facts(std::slice::from_ref(&fact))?;
        if save && !self.json {
            println!("{}", if self.registry.is_favorite(&fact.id) { "saved to favorites" } else { "not saved" });
        }
        Ok(())
    }

    async fn search(&self, query: &str, save: Option<&str>) -> Result<(), CliError> {
        let results = self.api.search(query).await?;
        if let Some(id) = save {
            let fact = results
                .iter()
                .find(|f| f.id == id)
                .ok_or_else(|| CliError::UnknownSearchId(id.to_owned()))?;
            self.registry.add(fact);
        }
        self.print_facts(&results)
    }

    fn favorites(&self, filter: Option<&str>, asc: bool, pages: usize) -> Result<(), CliError> {
        let mut feed = self.registry.get_all();
        let mut view = FavoritesView::new();
        if asc {
            view.set_sort(SortDirection::Asc);
        }
        if let Some(list) = feed.latest() {
            view.apply(&list);
        }
        view.paginate(pages);
        if let Some(text) = filter {
            view.search(text);
        }
        self.print_facts(view.displayed())
    }

    fn unfavorite(&self, id: &str) -> Result<(), CliError> {
        if !self.registry.is_favorite(id) {
            return Err(CliError::NotAFavorite(id.to_owned()));
        }
        self.registry.remove_by_id(id);
        if !self.json {
            println!("removed {id}");
        }
        Ok(())
    }

    fn reset(&self) -> Result<(), CliError> {
        self.store.remove(FAVORITES_STORAGE_KEY)?;
        if !self.json {
            println!("favorites cleared");
        }
        Ok(())
    }

    fn print_facts(&self, facts: &[FactRecord]) -> Result<(), CliError> {
        if self.json {
            for fact in facts {
                println!("{}", serde_json::to_string(fact)?);
            }
            return Ok(());
        }
        for fact in facts {
            let star = if self.registry.is_favorite(&fact.id) { "*" } else { " " };
            match &fact.source {
                Some(source) => println!("{star} [{}] {} ({source})", fact.id, fact.text),
                None => println!("{star} [{}] {}", fact.id, fact.text),
            }
        }
        Ok(())
    }
}
