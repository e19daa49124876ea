//! Callback query handlers module
//!
//! This module contains handlers for all inline keyboard button callbacks.
//! Callback data is colon separated with the first part naming the area:
//! `ci` for the check-in wizard, `ev` for events, `report` for admin reports.

pub mod checkin;

use teloxide::{prelude::*, types::{CallbackQuery, ChatId}};
use tracing::{debug, warn};
use crate::handlers::commands::{admin, events};
use crate::i18n::I18n;
use crate::services::ServiceFactory;
use crate::state::StateStorage;
use crate::utils::errors::{CbxError, Result};

/// Main callback query dispatcher
pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    services: &ServiceFactory,
    state_storage: &StateStorage,
    i18n: &I18n,
) -> Result<()> {
    let telegram_id = query.from.id.0 as i64;
    let lang = super::user_language(i18n, &query.from);
    let chat_id = query.message.as_ref().map_or(ChatId(telegram_id), |m| m.chat().id);

    let Some(data) = query.data.as_deref() else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    debug!(telegram_id, callback_data = %data, "Processing callback query");

    let (area, rest) = data.split_once(':').unwrap_or((data, ""));
    match area {
        "ev" => match parse_event_toggle(rest) {
            Some(event_id) => handle_event_toggle(&bot, &query, chat_id, telegram_id, event_id, services, i18n, &lang).await,
            None => {
                answer(&bot, &query).await;
                Err(CbxError::InvalidInput(format!("Bad event callback: {}", data)))
            }
        },
        "ci" => {
            answer(&bot, &query).await;
            checkin::handle_checkin_callback(&bot, chat_id, telegram_id, rest, services, state_storage, i18n, &lang).await
        }
        "report" => {
            answer(&bot, &query).await;
            admin::handle_report(&bot, chat_id, telegram_id, rest, services, i18n, &lang).await
        }
        _ => {
            answer(&bot, &query).await;
            warn!(telegram_id, callback_data = %data, "Unknown callback");
            Ok(())
        }
    }
}

/// Event id from `toggle:<id>`
pub fn parse_event_toggle(rest: &str) -> Option<i64> {
    rest.strip_prefix("toggle:")?.parse().ok()
}

/// Clear the button spinner. Failures only matter for the spinner.
async fn answer(bot: &Bot, query: &CallbackQuery) {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }
}

async fn handle_event_toggle(
    bot: &Bot,
    query: &CallbackQuery,
    chat_id: ChatId,
    telegram_id: i64,
    event_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let attendee = match services.auth_service.require_attendee(telegram_id).await {
        Ok(attendee) => attendee,
        Err(e) => {
            answer(bot, query).await;
            return Err(e);
        }
    };

    let interested = services.attendee_service.toggle_event_interest(attendee.id, event_id).await?;
    let key = if interested { "events.marked_interested" } else { "events.unmarked_interested" };
    bot.answer_callback_query(query.id.clone()).text(i18n.t(key, lang, None)).await?;

    // Redraw the buttons with the new state and counts
    if let Some(message) = &query.message {
        let listings = services.attendee_service.event_listing(Some(attendee.id)).await?;
        if let Err(e) = bot
            .edit_message_reply_markup(chat_id, message.id())
            .reply_markup(events::events_keyboard(&listings))
            .await
        {
            warn!(error = %e, "Failed to refresh event buttons");
        }
    }

    Ok(())
}
