//! Start, help, login and profile commands

use teloxide::{prelude::*, types::Message};
use tracing::{debug, info, warn};
use crate::i18n::I18n;
use crate::models::PaymentStatus;
use crate::services::{AttendeeProfile, ServiceFactory};
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{format_money, format_timestamp, normalize_whitespace};

/// Split `/login` arguments into name and phone.
///
/// The phone is the run of trailing tokens without letters, so both
/// `Ana Pérez 5551234567` and `Ana Pérez +1 555 123 4567` work.
pub fn parse_login_args(args: &str) -> Result<(String, String)> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let phone_start = tokens
        .iter()
        .rposition(|t| t.chars().any(char::is_alphabetic))
        .map_or(0, |i| i + 1);

    let name = tokens[..phone_start].join(" ");
    let phone = tokens[phone_start..].join(" ");
    if name.is_empty() || phone.is_empty() {
        return Err(CbxError::InvalidInput("auth.login_usage".to_string()));
    }

    Ok((normalize_whitespace(&name), phone))
}

pub async fn handle_start(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let trip = services.checkin_service.wizard().trip();
    debug!(telegram_id, "Processing /start command");

    let text = if services.auth_service.is_admin(telegram_id) {
        i18n.t_with("start.admin", lang, &[("trip", trip.name.clone())])
    } else {
        match services.auth_service.current_session(telegram_id).await? {
            Some(session) => match session.attendee_record() {
                Some(attendee) => i18n.t_with("start.returning", lang, &[
                    ("name", attendee.first_name().to_string()),
                    ("trip", trip.name.clone()),
                ]),
                None => i18n.t_with("start.welcome", lang, &[("trip", trip.name.clone())]),
            },
            None => i18n.t_with("start.welcome", lang, &[("trip", trip.name.clone())]),
        }
    };

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn handle_help(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let mut text = i18n.t("help.attendee", lang, None);
    if services.auth_service.is_admin(telegram_id) {
        text.push_str("\n\n");
        text.push_str(&i18n.t("help.admin", lang, None));
    }

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn handle_login(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    args: &str,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    // The message holds a phone number
    if !msg.chat.is_private() {
        if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
            warn!(error = %e, "Failed to delete login message outside private chat");
        }
        bot.send_message(msg.chat.id, i18n.t("auth.private_only", lang, None)).await?;
        return Ok(());
    }

    let (name, phone) = parse_login_args(args)?;
    let session = match services.auth_service.login_attendee(telegram_id, &name, &phone).await {
        Ok(session) => session,
        Err(CbxError::Authentication(reason)) => {
            info!(telegram_id, reason = %reason, "Login rejected");
            bot.send_message(msg.chat.id, i18n.t("auth.login_failed", lang, None)).await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let first_name = session.attendee_record().map(|a| a.first_name().to_string()).unwrap_or_default();
    bot.send_message(msg.chat.id, i18n.t_with("auth.login_success", lang, &[("name", first_name)])).await?;
    Ok(())
}

pub async fn handle_logout(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let key = if services.auth_service.logout(telegram_id).await? {
        "auth.logged_out"
    } else {
        "auth.not_logged_in"
    };

    bot.send_message(msg.chat.id, i18n.t(key, lang, None)).await?;
    Ok(())
}

pub async fn handle_me(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let attendee = services.auth_service.refresh_attendee(telegram_id).await?;
    let profile = services.attendee_service.profile(attendee.id).await?;
    let currency = &services.checkin_service.wizard().trip().currency;

    bot.send_message(msg.chat.id, render_profile(&profile, i18n, lang, currency)).await?;
    Ok(())
}

pub async fn handle_email(
    bot: &Bot,
    msg: &Message,
    telegram_id: i64,
    args: &str,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let email = args.trim();
    if email.is_empty() {
        return Err(CbxError::InvalidInput("profile.email_usage".to_string()));
    }

    let attendee = services.auth_service.require_attendee(telegram_id).await?;
    let updated = services.attendee_service
        .update_contact(attendee.id, Some(email.to_lowercase()), None)
        .await?;
    services.auth_service.refresh_attendee(telegram_id).await?;

    let shown = updated.email.unwrap_or_default();
    bot.send_message(msg.chat.id, i18n.t_with("profile.email_updated", lang, &[("email", shown)])).await?;
    Ok(())
}

pub fn render_profile(profile: &AttendeeProfile, i18n: &I18n, lang: &str, currency: &str) -> String {
    let attendee = &profile.attendee;
    let mut lines = vec![
        i18n.t_with("profile.header", lang, &[("name", attendee.name.clone())]),
        i18n.t_with("profile.phone", lang, &[("phone", attendee.phone.clone())]),
    ];
    if let Some(email) = &attendee.email {
        lines.push(i18n.t_with("profile.email", lang, &[("email", email.clone())]));
    }

    let checkin_key = if attendee.checked_in { "profile.checked_in" } else { "profile.not_checked_in" };
    lines.push(i18n.t(checkin_key, lang, None));

    match (&profile.booking, &profile.property) {
        (Some(booking), property) => {
            let property_name = property.as_ref().map_or_else(|| format!("#{}", booking.property_id), |p| p.name.clone());
            lines.push(i18n.t_with("profile.booking", lang, &[
                ("property", property_name),
                ("arrival", booking.arrival_date.to_string()),
                ("exit", booking.exit_date.to_string()),
                ("nights", booking.nights().to_string()),
            ]));
            if let Some(address) = property.as_ref().map(|p| p.address.clone()) {
                lines.push(i18n.t_with("profile.address", lang, &[("address", address)]));
            }

            let status_key = match booking.status() {
                PaymentStatus::Paid => "profile.payment.paid",
                PaymentStatus::Partial => "profile.payment.partial",
                PaymentStatus::Unpaid => "profile.payment.unpaid",
            };
            lines.push(i18n.t_with(status_key, lang, &[
                ("total", format_money(booking.total_amount, currency)),
                ("paid", format_money(booking.received(), currency)),
                ("due", format_money(booking.outstanding(), currency)),
            ]));
        }
        (None, _) => lines.push(i18n.t("profile.no_booking", lang, None)),
    }

    if attendee.has_vehicle {
        let seats = attendee.vehicle_seats.map_or_else(|| "?".to_string(), |s| s.to_string());
        lines.push(i18n.t_with("profile.transport.vehicle", lang, &[("seats", seats)]));
    }
    if attendee.wants_carpool {
        lines.push(i18n.t("profile.transport.carpool", lang, None));
    }
    if attendee.needs_pickup {
        lines.push(i18n.t("profile.transport.pickup", lang, None));
    }
    if let (Some(flight), Some(arrival)) = (&attendee.flight_number, attendee.flight_arrival) {
        lines.push(i18n.t_with("profile.transport.flight", lang, &[
            ("flight", flight.clone()),
            ("arrival", format_timestamp(arrival)),
        ]));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_login_simple() {
        let (name, phone) = parse_login_args("Ana 5551234567").unwrap();
        assert_eq!(name, "Ana");
        assert_eq!(phone, "5551234567");
    }

    #[test]
    fn test_parse_login_spaced_phone_and_full_name() {
        let (name, phone) = parse_login_args("  Ana   María Pérez +1 (555) 123-4567 ").unwrap();
        assert_eq!(name, "Ana María Pérez");
        assert_eq!(phone, "+1 (555) 123-4567");
    }

    #[test]
    fn test_parse_login_missing_parts() {
        assert_matches!(parse_login_args(""), Err(CbxError::InvalidInput(key)) if key == "auth.login_usage");
        assert!(parse_login_args("Ana").is_err());
        assert!(parse_login_args("5551234567").is_err());
    }
}
