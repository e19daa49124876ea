//! CBX Rentals Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use std::time::Duration;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::UpdateHandler;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use cbx_rentals::{
    config::Settings,
    utils::logging,
    database::{DatabaseService, create_pool, run_migrations},
    services::ServiceFactory,
    state::StateStorage,
    i18n::I18n,
    middleware::{LoggingMiddleware, RateLimitMiddleware},
    handlers::{self, Command},
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const CONTEXT_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // The guard flushes file logs on shutdown
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", cbx_rentals::info());

    info!("Connecting to database...");
    let db_pool = create_pool(&settings.database).await?;
    run_migrations(&db_pool).await?;
    let database_service = Arc::new(DatabaseService::new(db_pool));

    info!("Connecting to Redis...");
    let state_storage = Arc::new(StateStorage::new(settings.redis.clone()).await?);
    state_storage.test_connection().await?;

    info!("Loading translations...");
    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations().await?;

    info!("Initializing services...");
    let services = ServiceFactory::new(settings.clone(), database_service, state_storage.clone())?;

    let rate_limiter = RateLimitMiddleware::new(&settings.rate_limit, settings.bot.admin_ids.clone());
    let request_logger = LoggingMiddleware::default();

    let _context_cleanup = state_storage.spawn_cleanup(CONTEXT_CLEANUP_INTERVAL);
    let limiter_for_cleanup = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter_for_cleanup.cleanup();
        }
    });

    let bot = Bot::new(&settings.bot.token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let services_arc = Arc::new(services);
    let i18n_arc = Arc::new(i18n);

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![
            services_arc,
            state_storage,
            i18n_arc,
            rate_limiter,
            request_logger
        ])
        .default_handler(|upd| async move {
            warn!(update_id = upd.id.0, "Unhandled update");
        })
        .enable_ctrlc_handler()
        .build();

    info!("CBX Rentals bot is ready, polling for updates");
    dispatcher.dispatch().await;

    info!("CBX Rentals bot has been shut down.");
    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_commands),
                )
                .branch(dptree::endpoint(handle_messages)),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callbacks))
}

/// Language for messages sent before a handler runs
fn message_language(i18n: &I18n, msg: &Message) -> String {
    msg.from.as_ref().map_or_else(
        || i18n.default_language().to_string(),
        |user| handlers::user_language(i18n, user),
    )
}

/// Answer the user when the limiter rejects the request
async fn rejected(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    rate_limiter: &RateLimitMiddleware,
    i18n: &I18n,
    lang: &str,
) -> bool {
    match rate_limiter.check(telegram_id) {
        Ok(()) => false,
        Err(e) => {
            if let Err(send_err) = bot.send_message(chat_id, handlers::error_text(i18n, &e, lang)).await {
                warn!(error = %send_err, "Failed to send rate limit reply");
            }
            true
        }
    }
}

async fn handle_commands(
    bot: Bot,
    msg: Message,
    cmd: Command,
    services: Arc<ServiceFactory>,
    state_storage: Arc<StateStorage>,
    i18n: Arc<I18n>,
    rate_limiter: RateLimitMiddleware,
    request_logger: LoggingMiddleware,
) -> HandlerResult {
    request_logger.log_message(&msg);
    let chat_id = msg.chat.id;
    let lang = message_language(&i18n, &msg);
    let telegram_id = msg.from.as_ref().map_or(chat_id.0, |u| u.id.0 as i64);

    if rejected(&bot, chat_id, telegram_id, &rate_limiter, &i18n, &lang).await {
        return Ok(());
    }

    let operation = cmd.name();
    let timer = request_logger.track(operation);
    let result = handlers::handle_command(bot.clone(), msg, cmd, &services, &state_storage, &i18n).await;

    if let Some(timer) = timer {
        timer.complete(result.is_ok());
    }
    if let Err(e) = result {
        handlers::reply_error(&bot, chat_id, &e, &services.telemetry_service, &i18n, &lang, operation).await;
    }
    Ok(())
}

async fn handle_messages(
    bot: Bot,
    msg: Message,
    services: Arc<ServiceFactory>,
    state_storage: Arc<StateStorage>,
    i18n: Arc<I18n>,
    rate_limiter: RateLimitMiddleware,
    request_logger: LoggingMiddleware,
) -> HandlerResult {
    request_logger.log_message(&msg);
    let chat_id = msg.chat.id;
    let lang = message_language(&i18n, &msg);
    let telegram_id = msg.from.as_ref().map_or(chat_id.0, |u| u.id.0 as i64);

    if rejected(&bot, chat_id, telegram_id, &rate_limiter, &i18n, &lang).await {
        return Ok(());
    }

    let timer = request_logger.track("message");
    let result = handlers::handle_message(bot.clone(), msg, &services, &state_storage, &i18n).await;

    if let Some(timer) = timer {
        timer.complete(result.is_ok());
    }
    if let Err(e) = result {
        handlers::reply_error(&bot, chat_id, &e, &services.telemetry_service, &i18n, &lang, "message").await;
    }
    Ok(())
}

async fn handle_callbacks(
    bot: Bot,
    query: CallbackQuery,
    services: Arc<ServiceFactory>,
    state_storage: Arc<StateStorage>,
    i18n: Arc<I18n>,
    rate_limiter: RateLimitMiddleware,
    request_logger: LoggingMiddleware,
) -> HandlerResult {
    request_logger.log_callback(&query);
    let telegram_id = query.from.id.0 as i64;
    let chat_id = query.message.as_ref().map_or(ChatId(telegram_id), |m| m.chat().id);
    let lang = handlers::user_language(&i18n, &query.from);

    if let Err(e) = rate_limiter.check(telegram_id) {
        let text = handlers::error_text(&i18n, &e, &lang);
        if let Err(answer_err) = bot.answer_callback_query(query.id.clone()).text(text).await {
            warn!(error = %answer_err, "Failed to answer rate limited callback");
        }
        return Ok(());
    }

    let timer = request_logger.track("callback");
    let result = handlers::handle_callback_query(bot.clone(), query, &services, &state_storage, &i18n).await;

    if let Some(timer) = timer {
        timer.complete(result.is_ok());
    }
    if let Err(e) = result {
        handlers::reply_error(&bot, chat_id, &e, &services.telemetry_service, &i18n, &lang, "callback").await;
    }
    Ok(())
}

