use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shopbot::api::{self, AppState};
use shopbot::bot::schema;
use shopbot::config::Config;
use shopbot::db;
use shopbot::dialogue::AdminDialogueState;
use shopbot::localization::init_localization;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting shop bot");

    let config = Arc::new(Config::from_env()?);
    init_localization()?;

    let pool = db::connect(&config.database_url).await?;
    db::init_database_schema(&pool).await?;
    db::seed_default_categories(&pool).await?;

    let bot = Bot::new(config.bot_token.clone());

    let state = AppState {
        pool: pool.clone(),
        notifier: Arc::new(bot.clone()),
        config: Arc::clone(&config),
    };
    let port = config.port;

    info!(operators = config.admin_ids.len(), web_app_url = %config.web_app_url, "Bot initialized, starting dispatcher");

    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            InMemStorage::<AdminDialogueState>::new(),
            pool,
            Arc::clone(&config)
        ])
        .enable_ctrlc_handler()
        .build();

    tokio::select! {
        result = api::serve(state, port) => {
            if let Err(e) = &result {
                error!(error = %e, "HTTP API stopped");
            }
            result?;
        }
        _ = dispatcher.dispatch() => {
            info!("Dispatcher stopped");
        }
    }

    Ok(())
}
