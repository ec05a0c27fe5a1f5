use clap::Parser;
use payoll_core::adapters::{postgres_repositories, HttpMailer, InMemoryStore, LogMailer};
use payoll_core::cli::{Cli, Commands, DbCommands, TxCommands, UserCommands};
use payoll_core::config::{Config, LogFormat};
use payoll_core::health::PostgresChecker;
use payoll_core::ports::Mailer;
use payoll_core::services::BillPricer;
use payoll_core::xendit::XenditClient;
use payoll_core::{create_app, AppState};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    match cli.command {
        None => serve(config, false).await,
        Some(Commands::Serve { in_memory }) => serve(config, in_memory).await,
        Some(Commands::Tx(TxCommands::SetStatus { tx_id, status })) => {
            let state = postgres_state(&config).await?;
            payoll_core::cli::handle_tx_set_status(&state.transactions, tx_id, &status).await
        }
        Some(Commands::Db(DbCommands::Migrate)) => {
            payoll_core::cli::handle_db_migrate(&config).await
        }
        Some(Commands::User(UserCommands::Create {
            name,
            email,
            role,
            password,
        })) => {
            let state = postgres_state(&config).await?;
            payoll_core::cli::handle_user_create(
                &state.users,
                &name,
                &email,
                role,
                password.as_deref(),
            )
            .await
        }
        Some(Commands::Token {
            user_id,
            role,
            hours,
        }) => payoll_core::cli::handle_token(&config, user_id, role, hours),
        Some(Commands::Config) => payoll_core::cli::handle_config_validate(&config),
    }
}

fn gateway(config: &Config) -> Arc<XenditClient> {
    let client = XenditClient::new(
        config.xendit_base_url.clone(),
        config.xendit_secret_key.clone(),
        config.gateway_timeout(),
    );
    tracing::info!(base_url = %client.base_url(), "Xendit client initialized");
    Arc::new(client)
}

fn mailer(config: &Config) -> Arc<dyn Mailer> {
    match &config.mail {
        Some(mail) => {
            let mailer = HttpMailer::from_config(mail, config.gateway_timeout());
            tracing::info!(api_url = %mailer.api_url(), "Mail API configured");
            Arc::new(mailer)
        }
        None => {
            tracing::warn!("MAIL_API_KEY is not set; OTP mail is logged, not sent");
            Arc::new(LogMailer)
        }
    }
}

async fn postgres_state(config: &Config) -> anyhow::Result<AppState> {
    let settings = config.service_settings();
    let pool = payoll_core::db::create_pool(config.database_url()?, settings.storage_timeout).await?;
    payoll_core::db::run_migrations(&pool, Path::new(payoll_core::db::MIGRATIONS_DIR)).await?;

    let state = AppState::new(
        postgres_repositories(pool.clone()),
        gateway(config),
        mailer(config),
        BillPricer::new(),
        settings,
        &config.jwt_secret,
        config.xendit_callback_token.as_deref(),
    )
    .with_health_checker(Arc::new(PostgresChecker::new(pool)));
    Ok(state)
}

async fn serve(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let state = if in_memory {
        tracing::warn!("Running with in-memory storage; data is lost on shutdown");
        AppState::new(
            InMemoryStore::new().repositories(),
            gateway(&config),
            Arc::new(LogMailer),
            BillPricer::new(),
            config.service_settings(),
            &config.jwt_secret,
            config.xendit_callback_token.as_deref(),
        )
    } else {
        postgres_state(&config).await?
    };

    if config.xendit_callback_token.is_none() {
        tracing::warn!("XENDIT_CALLBACK_TOKEN is not set; callbacks are accepted unauthenticated");
    }

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
