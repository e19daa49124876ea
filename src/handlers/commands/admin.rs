//! Admin command handlers
//!
//! Every handler here starts with `require_admin`, which accepts only the
//! Telegram accounts listed in `bot.admin_ids`.

use std::collections::HashMap;
use std::str::FromStr;
use chrono::NaiveDate;
use teloxide::{prelude::*, types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message}};
use crate::handlers::send_long;
use crate::i18n::I18n;
use crate::models::{Attendee, Booking, PaymentMethod, PaymentStatus, Property};
use crate::services::{ReportKind, ServiceFactory};
use crate::state::StateStorage;
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{format_money, parse_date};
use crate::utils::logging::log_admin_action;

fn usage(command: &str) -> CbxError {
    CbxError::InvalidInput(format!("admin.usage.{}", command))
}

pub fn parse_mark_paid_args(args: &str) -> Result<(i64, PaymentMethod)> {
    let mut parts = args.split_whitespace();
    let booking_id = parts.next().and_then(|s| s.trim_start_matches('#').parse().ok());
    // Methods such as "cash app" may span two words
    let method = parts.collect::<Vec<_>>().join(" ");

    match (booking_id, PaymentMethod::from_str(&method)) {
        (Some(id), Ok(method)) => Ok((id, method)),
        _ => Err(usage("markpaid")),
    }
}

pub fn parse_reset_args(args: &str) -> Result<i64> {
    args.trim().trim_start_matches('#').parse().map_err(|_| usage("resetcheckin"))
}

pub fn parse_assign_args(args: &str) -> Result<(i64, i64, NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [attendee, property, arrival, exit] = parts.as_slice() else {
        return Err(usage("assign"));
    };

    let attendee_id = attendee.trim_start_matches('#').parse().map_err(|_| usage("assign"))?;
    let property_id = property.trim_start_matches('#').parse().map_err(|_| usage("assign"))?;
    let arrival = parse_date(arrival).ok_or_else(|| usage("assign"))?;
    let exit = parse_date(exit).ok_or_else(|| usage("assign"))?;
    if exit <= arrival {
        return Err(CbxError::InvalidInput("checkin.dates.order".to_string()));
    }

    Ok((attendee_id, property_id, arrival, exit))
}

pub fn reports_keyboard(i18n: &I18n, lang: &str) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = ReportKind::ALL
        .iter()
        .map(|kind| InlineKeyboardButton::callback(
            i18n.t(&format!("report.names.{}", kind.as_str()), lang, None),
            format!("report:{}", kind.as_str()),
        ))
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(<[InlineKeyboardButton]>::to_vec))
}

pub async fn handle_admin_panel(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    services.auth_service.require_admin(telegram_id).await?;

    let (total, checked_in) = futures::try_join!(
        services.database.attendees.count(),
        services.database.attendees.count_checked_in(),
    )?;

    let text = i18n.t_with("admin.panel", lang, &[
        ("total", total.to_string()),
        ("checked_in", checked_in.to_string()),
    ]);
    bot.send_message(msg.chat.id, text).reply_markup(reports_keyboard(i18n, lang)).await?;
    Ok(())
}

pub async fn handle_report(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    args: &str,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    services.auth_service.require_admin(telegram_id).await?;

    let args = args.trim();
    if args.is_empty() {
        bot.send_message(chat_id, i18n.t("report.choose", lang, None))
            .reply_markup(reports_keyboard(i18n, lang))
            .await?;
        return Ok(());
    }

    let kind = ReportKind::from_str(args)?;
    let text = services.report_service.render(kind, i18n, lang).await?;
    log_admin_action(telegram_id, "report", Some(kind.as_str()), None);
    send_long(bot, chat_id, &text).await
}

pub async fn handle_attendees(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    services.auth_service.require_admin(telegram_id).await?;

    let db = &services.database;
    let (attendees, bookings, properties) = futures::try_join!(
        db.attendees.list_all(),
        db.bookings.list(),
        db.properties.list(),
    )?;

    if attendees.is_empty() {
        bot.send_message(msg.chat.id, i18n.t("admin.no_attendees", lang, None)).await?;
        return Ok(());
    }

    let currency = &services.checkin_service.wizard().trip().currency;
    let text = render_attendee_list(&attendees, &bookings, &properties, currency);
    send_long(bot, msg.chat.id, &text).await
}

pub fn render_attendee_list(attendees: &[Attendee], bookings: &[Booking], properties: &[Property], currency: &str) -> String {
    let bookings: HashMap<i64, &Booking> = bookings.iter().map(|b| (b.attendee_id, b)).collect();
    let properties: HashMap<i64, &Property> = properties.iter().map(|p| (p.id, p)).collect();

    attendees
        .iter()
        .map(|attendee| {
            let checked = if attendee.checked_in { "✅" } else { "⬜" };
            let mut line = format!("{} #{} {} · {}", checked, attendee.id, attendee.name, attendee.phone);

            match bookings.get(&attendee.id) {
                Some(booking) => {
                    let property = properties.get(&booking.property_id).map_or("?", |p| p.name.as_str());
                    let status = match booking.status() {
                        PaymentStatus::Paid => "paid".to_string(),
                        PaymentStatus::Partial => format!("due {}", format_money(booking.outstanding(), currency)),
                        PaymentStatus::Unpaid => format!("unpaid {}", format_money(booking.total_amount, currency)),
                    };
                    line.push_str(&format!(" · booking #{} {} {}→{} · {}",
                        booking.id, property, booking.arrival_date, booking.exit_date, status));
                }
                None => line.push_str(" · no booking"),
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle_mark_paid(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    args: &str,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    services.auth_service.require_admin(telegram_id).await?;

    let (booking_id, method) = parse_mark_paid_args(args)?;
    let booking = services.database.confirm_payment(booking_id, method, Some(telegram_id)).await?;
    log_admin_action(telegram_id, "mark_paid", Some(&booking_id.to_string()), Some(method.as_str()));

    let currency = &services.checkin_service.wizard().trip().currency;
    bot.send_message(msg.chat.id, i18n.t_with("admin.marked_paid", lang, &[
        ("booking", booking.id.to_string()),
        ("amount", format_money(booking.total_amount, currency)),
        ("method", method.label().to_string()),
    ])).await?;
    Ok(())
}

pub async fn handle_reset_checkin(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    args: &str,
    services: &ServiceFactory,
    state_storage: &StateStorage,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    services.auth_service.require_admin(telegram_id).await?;

    let attendee_id = parse_reset_args(args)?;
    let attendee = services.database.reset_checkin(attendee_id, Some(telegram_id)).await?;
    if let Some(attendee_telegram) = attendee.telegram_id {
        state_storage.delete_context(attendee_telegram).await?;
    }
    log_admin_action(telegram_id, "reset_checkin", Some(&attendee_id.to_string()), None);

    bot.send_message(msg.chat.id, i18n.t_with("admin.checkin_reset", lang, &[("name", attendee.name)])).await?;
    Ok(())
}

pub async fn handle_assign(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    args: &str,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    services.auth_service.require_admin(telegram_id).await?;

    let (attendee_id, property_id, arrival, exit) = parse_assign_args(args)?;
    let booking = services.database
        .assign_attendee(attendee_id, property_id, arrival, exit, Some(telegram_id))
        .await?;
    log_admin_action(
        telegram_id,
        "assign",
        Some(&attendee_id.to_string()),
        Some(&format!("property={} {}..{}", property_id, arrival, exit)),
    );

    let currency = &services.checkin_service.wizard().trip().currency;
    bot.send_message(msg.chat.id, i18n.t_with("admin.assigned", lang, &[
        ("booking", booking.id.to_string()),
        ("attendee", attendee_id.to_string()),
        ("property", property_id.to_string()),
        ("amount", format_money(booking.total_amount, currency)),
    ])).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_mark_paid() {
        assert_eq!(parse_mark_paid_args("12 venmo").unwrap(), (12, PaymentMethod::Venmo));
        assert_eq!(parse_mark_paid_args("#12 Cash App").unwrap(), (12, PaymentMethod::CashApp));
        assert_matches!(parse_mark_paid_args("12"), Err(CbxError::InvalidInput(key)) if key == "admin.usage.markpaid");
        assert!(parse_mark_paid_args("twelve venmo").is_err());
        assert!(parse_mark_paid_args("12 bitcoin").is_err());
    }

    #[test]
    fn test_parse_reset() {
        assert_eq!(parse_reset_args(" 7 ").unwrap(), 7);
        assert!(parse_reset_args("").is_err());
    }

    #[test]
    fn test_parse_assign() {
        let (a, p, arrival, exit) = parse_assign_args("4 2 2026-03-12 2026-03-15").unwrap();
        assert_eq!((a, p), (4, 2));
        assert_eq!(arrival, NaiveDate::from_ymd_opt(2026, 3, 12).unwrap());
        assert_eq!(exit, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());

        assert_matches!(parse_assign_args("4 2 2026-03-15 2026-03-12"), Err(CbxError::InvalidInput(key)) if key == "checkin.dates.order");
        assert_matches!(parse_assign_args("4 2 2026-03-15"), Err(CbxError::InvalidInput(key)) if key == "admin.usage.assign");
    }
}
