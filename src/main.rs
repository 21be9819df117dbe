use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use country_atlas::config::{Config, ConfigOverrides};
use country_atlas::country::{CountryFilter, SortKey};
use country_atlas::output::csv::countries_to_csv;
use country_atlas::output::json::render_json;
use country_atlas::output::table::{
    render_countries_table, render_refresh_table, render_status_table,
};
use country_atlas::refresh::{GdpEstimator, Reconciler};
use country_atlas::server::run_server;
use country_atlas::store::CountryStore;
use country_atlas::upstream::Upstreams;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "country-atlas",
    about = "Country metadata and exchange-rate aggregation service"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, env = "COUNTRY_ATLAS_DB")]
    db: Option<String>,
    #[arg(long, env = "COUNTRY_ATLAS_IMAGE")]
    image: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Pull both upstream feeds, reconcile the store and redraw the summary image.
    Refresh,
    List {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        sort: Option<String>,
    },
    Show {
        name: String,
    },
    Delete {
        name: String,
    },
    Status,
    /// Print where the summary image lives.
    Image,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        image_path: cli.image.clone(),
        host,
        port,
    });

    match &cli.command {
        Commands::Config { init, show } => {
            if *init {
                Config::write_template(&config_path)?;
                println!("Wrote config template to {}", config_path.display());
            }
            if *show || !*init {
                println!("{}", render_json(&config)?);
            }
        }
        Commands::Serve { .. } => {
            let bind = format!("{}:{}", config.server.host, config.server.port);
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            let upstreams = Upstreams::from_config(&config)?;
            run_server(config, upstreams, addr).await?;
        }
        Commands::Refresh => {
            let reconciler = Reconciler::new(
                Upstreams::from_config(&config)?,
                GdpEstimator::from_config(&config.estimate),
            );
            let summary = reconciler
                .refresh(&config.resolved_db_path(), &config.resolved_image_path())
                .await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_refresh_table(&summary)),
                OutputFormat::Json => println!("{}", render_json(&summary)?),
                OutputFormat::Csv => {
                    warn!("CSV output for refresh not implemented, using JSON");
                    println!("{}", render_json(&summary)?);
                }
            }
        }
        Commands::List {
            region,
            currency,
            sort,
        } => {
            let sort = sort.as_deref().map(SortKey::from_str).transpose()?;
            let filter = CountryFilter {
                region: region.clone(),
                currency: currency.clone(),
            };
            let store = CountryStore::open(&config.resolved_db_path())?;
            let countries = store.list(&filter, sort)?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_countries_table(&countries)),
                OutputFormat::Json => println!("{}", render_json(&countries)?),
                OutputFormat::Csv => print!("{}", countries_to_csv(&countries)?),
            }
        }
        Commands::Show { name } => {
            let store = CountryStore::open(&config.resolved_db_path())?;
            let country = store
                .get(name)?
                .ok_or_else(|| anyhow!("country not found: {name}"))?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_countries_table(std::slice::from_ref(&country)))
                }
                OutputFormat::Json => println!("{}", render_json(&country)?),
                OutputFormat::Csv => print!("{}", countries_to_csv(&[country])?),
            }
        }
        Commands::Delete { name } => {
            let store = CountryStore::open(&config.resolved_db_path())?;
            if !store.delete(name)? {
                return Err(anyhow!("country not found: {name}"));
            }
            println!("Deleted {name}");
        }
        Commands::Status => {
            let store = CountryStore::open(&config.resolved_db_path())?;
            let status = store.status()?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_status_table(&status)),
                OutputFormat::Json => println!("{}", render_json(&status)?),
                OutputFormat::Csv => {
                    warn!("CSV output for status not implemented, using JSON");
                    println!("{}", render_json(&status)?);
                }
            }
        }
        Commands::Image => {
            let path = config.resolved_image_path();
            if !path.exists() {
                return Err(anyhow!(
                    "summary image not generated yet, run `country-atlas refresh` first"
                ));
            }
            println!("{}", path.display());
        }
    }

    Ok(())
}
