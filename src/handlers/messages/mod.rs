//! Message handlers module
//!
//! Handles typed answers to the check-in wizard and photo uploads.

use std::str::FromStr;
use rust_decimal::Decimal;
use teloxide::{net::Download, prelude::*, types::{ChatId, Message, PhotoSize}};
use tracing::{debug, info};
use crate::handlers::commands::checkin::{awaiting, show_step, AwaitingInput, AWAITING_KEY};
use crate::i18n::I18n;
use crate::services::{FlightDetails, PaymentChoice, PhotoUpload, ServiceFactory, TransportChoice};
use crate::state::{CheckInStep, ConversationContext, StateStorage};
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{format_bytes, parse_date};

/// Handle a non-command message in a private chat
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    services: &ServiceFactory,
    state_storage: &StateStorage,
    i18n: &I18n,
) -> Result<()> {
    let user = msg.from.as_ref()
        .ok_or_else(|| CbxError::InvalidInput("No user in message".to_string()))?;
    let telegram_id = user.id.0 as i64;
    let lang = super::user_language(i18n, user);
    let chat_id = msg.chat.id;

    if !msg.chat.is_private() {
        debug!(chat_id = chat_id.0, "Ignoring message outside private chat");
        return Ok(());
    }

    if let Some(photos) = msg.photo() {
        return handle_photo(&bot, &msg, telegram_id, photos, services, i18n, &lang).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(context) = state_storage.load_context(telegram_id).await? {
        if services.checkin_service.wizard().current_step(&context).is_some() {
            return handle_wizard_text(&bot, chat_id, context, text, services, i18n, &lang).await;
        }
    }

    let key = if text.starts_with('/') { "errors.unknown_command" } else { "help.hint" };
    bot.send_message(chat_id, i18n.t(key, &lang, None)).await?;
    Ok(())
}

/// Parse `YYYY-MM-DD YYYY-MM-DD`
pub fn parse_date_range(text: &str) -> Result<(chrono::NaiveDate, chrono::NaiveDate)> {
    let invalid = || CbxError::InvalidInput("checkin.dates.invalid".to_string());
    let mut parts = text.split_whitespace();
    let (Some(arrival), Some(exit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    Ok((parse_date(arrival).ok_or_else(invalid)?, parse_date(exit).ok_or_else(invalid)?))
}

/// Parse a money amount such as `120` or `$120.50`
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let cleaned: String = text.trim().trim_start_matches('$').replace(',', "");
    Decimal::from_str(&cleaned)
        .ok()
        .filter(|amount| amount.scale() <= 2)
        .ok_or_else(|| CbxError::InvalidInput("checkin.payment.amount_invalid".to_string()))
}

async fn handle_wizard_text(
    bot: &Bot,
    chat_id: ChatId,
    mut context: ConversationContext,
    text: &str,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let checkin = &services.checkin_service;
    let step = checkin.wizard().current_step(&context)
        .ok_or_else(|| CbxError::InvalidInput("No active check-in".to_string()))?;
    let pending = awaiting(&context);

    let next = match (step, pending) {
        (CheckInStep::Dates, _) => {
            checkin.wizard().scenarios().validate_input(&context, text)?;
            let (arrival, exit) = parse_date_range(text)?;
            checkin.submit_dates(&mut context, arrival, exit).await?;
            CheckInStep::Arrival
        }
        (CheckInStep::Arrival, Some(pending @ (AwaitingInput::Flight | AwaitingInput::PickupFlight))) => {
            checkin.wizard().scenarios().validate_input(&context, text)?;
            let flight = FlightDetails::parse(text)?;
            let choice = match pending {
                AwaitingInput::Flight => TransportChoice::Flying { flight },
                _ => TransportChoice::NeedsPickup { flight: Some(flight) },
            };
            context.remove_data(AWAITING_KEY);
            checkin.submit_arrival(&mut context, choice).await?;
            CheckInStep::Property
        }
        (CheckInStep::Payment, Some(AwaitingInput::PartialAmount { method })) => {
            let amount = parse_amount(text)?;
            context.remove_data(AWAITING_KEY);
            checkin.submit_payment(&mut context, PaymentChoice::Partial { method, amount }).await?;
            CheckInStep::Complete
        }
        _ => {
            bot.send_message(chat_id, i18n.t("checkin.use_buttons", lang, None)).await?;
            return Ok(());
        }
    };

    let draft = checkin.wizard().draft(&context)?;
    show_step(bot, chat_id, next, &draft, services, i18n, lang).await
}

async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    photos: &[PhotoSize],
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let attendee = services.auth_service.require_attendee(telegram_id).await?;

    // Telegram sends several sizes; keep the largest
    let photo = photos
        .iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        .ok_or_else(|| CbxError::InvalidInput("photos.empty".to_string()))?;

    let max_bytes = services.attendee_service.max_upload_bytes();
    if u64::from(photo.file.size) > max_bytes {
        bot.send_message(msg.chat.id, i18n.t_with("photos.too_large_limit", lang, &[
            ("limit", format_bytes(max_bytes)),
        ])).await?;
        return Ok(());
    }

    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut bytes = Vec::with_capacity(file.meta.size as usize);
    bot.download_file(&file.path, &mut bytes).await?;

    let filename = file.path.rsplit('/').next().unwrap_or("photo.jpg").to_string();
    let stored = services.attendee_service.add_photo(&attendee, PhotoUpload {
        bytes,
        content_type: "image/jpeg".to_string(),
        filename,
        width: i32::try_from(photo.width).ok(),
        height: i32::try_from(photo.height).ok(),
        caption: msg.caption().map(str::to_string),
    }).await?;

    info!(attendee_id = attendee.id, photo_id = stored.id, "Photo stored");
    bot.send_message(msg.chat.id, i18n.t("photos.uploaded", lang, None)).await?;
    Ok(())
}
