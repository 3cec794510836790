mod collect;
mod report;


use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "viewtrend-cli")]
#[command(about = "viewtrend command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one ingestion cycle now
    Collect {
        /// Only collect this scope (defaults to every configured scope)
        #[arg(long)]
        scope: Option<String>,
        /// Fetch and print observations without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Rank items in a scope by growth over a trailing window
    Growth {
        #[arg(long)]
        scope: String,
        /// Window length in minutes (defaults to VIEWTREND_DEFAULT_WINDOW_MINUTES)
        #[arg(long)]
        window_minutes: Option<i64>,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show the most-viewed items in a scope as of the latest capture
    Latest {
        #[arg(long)]
        scope: String,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show recent ingestion runs
    Runs {
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("viewtrend-cli: use --help to list commands");
        return Ok(());
    };

    let config = viewtrend_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Collect {
        scope,
        dry_run: true,
    } = &command
    {
        return collect::run_collect_dry_run(&config, scope.as_deref()).await;
    }

    let pool_config = viewtrend_db::PoolConfig::from_app_config(&config);
    let pool = viewtrend_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                viewtrend_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = viewtrend_db::run_migrations(&pool).await?;
                println!("migrations up to date ({applied} applied)");
            }
        },
        Commands::Collect { scope, .. } => {
            collect::run_collect(&pool, &config, scope.as_deref()).await?;
        }
        Commands::Growth {
            scope,
            window_minutes,
            limit,
        } => {
            let window = window_minutes.unwrap_or(config.default_window_minutes);
            report::run_growth(&pool, &scope, window, limit).await?;
        }
        Commands::Latest { scope, limit } => report::run_latest(&pool, &scope, limit).await?,
        Commands::Runs { scope, limit } => {
            report::run_runs(&pool, scope.as_deref(), limit).await?;
        }
    }

    Ok(())
}
