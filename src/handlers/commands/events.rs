//! Events listing and interest buttons

use teloxide::{prelude::*, types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup}};
use crate::i18n::I18n;
use crate::models::EventListing;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;
use crate::utils::helpers::{format_timestamp, truncate_text};

const BUTTON_TITLE_CHARS: usize = 40;

/// Show upcoming events. Logged-in attendees get a toggle button per event.
pub async fn handle_events_list(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let attendee_id = services.auth_service.require_attendee(telegram_id).await.ok().map(|a| a.id);
    let listings = services.attendee_service.event_listing(attendee_id).await?;

    if listings.is_empty() {
        bot.send_message(chat_id, i18n.t("events.none", lang, None)).await?;
        return Ok(());
    }

    let text = render_events(&listings, i18n, lang);
    if attendee_id.is_some() {
        bot.send_message(chat_id, text).reply_markup(events_keyboard(&listings)).await?;
    } else {
        let hint = i18n.t("events.login_to_join", lang, None);
        bot.send_message(chat_id, format!("{}\n\n{}", text, hint)).await?;
    }
    Ok(())
}

pub fn render_events(listings: &[EventListing], i18n: &I18n, lang: &str) -> String {
    let mut lines = vec![i18n.t("events.header", lang, None)];

    for listing in listings {
        let event = &listing.event;
        lines.push(String::new());
        let mark = if listing.interested { "★" } else { "☆" };
        lines.push(format!("{} {} · {}", mark, event.title, format_timestamp(event.starts_at)));
        if let Some(location) = &event.location_name {
            lines.push(format!("📍 {}", location));
        }
        if let Some(description) = &event.description {
            lines.push(truncate_text(description, 200));
        }
        if event.is_optional {
            lines.push(i18n.t("events.optional", lang, None));
        }
        lines.push(i18n.tp("events.interested", lang, listing.interest_count, None));
    }

    lines.join("\n")
}

pub fn events_keyboard(listings: &[EventListing]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(listings.iter().map(|listing| {
        let mark = if listing.interested { "★" } else { "☆" };
        vec![InlineKeyboardButton::callback(
            format!("{} {} ({})", mark, truncate_text(&listing.event.title, BUTTON_TITLE_CHARS), listing.interest_count),
            format!("ev:toggle:{}", listing.event.id),
        )]
    }))
}
