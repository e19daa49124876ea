//! Check-in wizard screens
//!
//! `/checkin` opens the wizard. Each step is rendered as a message with an
//! inline keyboard; button presses arrive as `ci:*` callbacks and typed
//! answers through the message handler.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use teloxide::{prelude::*, types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup}};
use tracing::info;
use crate::i18n::I18n;
use crate::models::{PaymentMethod, Property};
use crate::services::{CheckInDraft, PaymentChoice, PropertyOption, ServiceFactory, TransportChoice};
use crate::state::{CheckInStep, ConversationContext};
use crate::utils::errors::Result;
use crate::utils::helpers::{format_money, format_timestamp};

/// Context key holding the typed answer the wizard waits for
pub const AWAITING_KEY: &str = "awaiting";

/// Most passengers offered on the vehicle seats keyboard
const MAX_OFFERED_SEATS: i32 = 6;

/// Free-text answer expected at the current step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AwaitingInput {
    Flight,
    PickupFlight,
    PartialAmount { method: PaymentMethod },
}

pub fn awaiting(context: &ConversationContext) -> Option<AwaitingInput> {
    context.get_data(AWAITING_KEY).ok().flatten()
}

pub async fn handle_checkin(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let attendee = services.auth_service.refresh_attendee(telegram_id).await?;
    let (_, draft) = services.checkin_service.start(&attendee).await?;
    info!(telegram_id, attendee_id = attendee.id, "Check-in wizard opened");

    if attendee.checked_in {
        bot.send_message(chat_id, i18n.t("checkin.already_checked_in", lang, None)).await?;
    }
    show_step(bot, chat_id, CheckInStep::Dates, &draft, services, i18n, lang).await
}

/// Send the screen for `step`
pub async fn show_step(
    bot: &Bot,
    chat_id: ChatId,
    step: CheckInStep,
    draft: &CheckInDraft,
    services: &ServiceFactory,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let wizard = services.checkin_service.wizard();
    let currency = &wizard.trip().currency;

    let (body, rows) = match step {
        CheckInStep::Dates => dates_view(draft, wizard.trip(), i18n, lang),
        CheckInStep::Arrival => arrival_view(i18n, lang),
        CheckInStep::Property => {
            let options = services.checkin_service.property_options(draft).await?;
            property_view(&options, i18n, lang, currency)
        }
        CheckInStep::Payment => payment_view(draft, i18n, lang, currency),
        CheckInStep::Complete => {
            let property = match draft.property_id {
                Some(id) => services.database.properties.find_by_id(id).await?,
                None => None,
            };
            summary_view(draft, property.as_ref(), i18n, lang, currency)
        }
    };

    let text = format!("{}\n\n{}", step_header(step, i18n, lang), body);
    let keyboard = InlineKeyboardMarkup::new(with_navigation(rows, step, i18n, lang));
    bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    Ok(())
}

fn step_header(step: CheckInStep, i18n: &I18n, lang: &str) -> String {
    if step.is_terminal() {
        return i18n.t("checkin.summary.title", lang, None);
    }
    i18n.t_with("checkin.step_header", lang, &[
        ("current", (step.index() + 1).to_string()),
        ("total", CheckInStep::INTERACTIVE.len().to_string()),
        ("title", i18n.t(&format!("checkin.{}.title", step.id()), lang, None)),
    ])
}

type Rows = Vec<Vec<InlineKeyboardButton>>;

fn with_navigation(mut rows: Rows, step: CheckInStep, i18n: &I18n, lang: &str) -> Rows {
    let mut nav = Vec::new();
    if step.previous().is_some() {
        nav.push(InlineKeyboardButton::callback(i18n.t("buttons.back", lang, None), "ci:back"));
    }
    nav.push(InlineKeyboardButton::callback(i18n.t("buttons.cancel", lang, None), "ci:cancel"));
    rows.push(nav);
    rows
}

pub fn dates_view(draft: &CheckInDraft, trip: &crate::config::TripConfig, i18n: &I18n, lang: &str) -> (String, Rows) {
    let mut text = i18n.t_with("checkin.dates.prompt", lang, &[
        ("start", trip.start_date.to_string()),
        ("end", trip.end_date.to_string()),
    ]);
    let mut rows = Vec::new();

    if let (Some(arrival), Some(exit)) = (draft.arrival_date, draft.exit_date) {
        text.push_str("\n\n");
        text.push_str(&i18n.t_with("checkin.dates.current", lang, &[
            ("arrival", arrival.to_string()),
            ("exit", exit.to_string()),
        ]));
        rows.push(vec![InlineKeyboardButton::callback(
            i18n.t("buttons.keep_dates", lang, None),
            "ci:dates:keep",
        )]);
    }

    (text, rows)
}

pub fn arrival_view(i18n: &I18n, lang: &str) -> (String, Rows) {
    let button = |key: &str, data: &str| InlineKeyboardButton::callback(i18n.t(key, lang, None), data.to_string());
    let rows = vec![
        vec![button("buttons.transport.own_vehicle", "ci:arr:own")],
        vec![button("buttons.transport.flying", "ci:arr:fly")],
        vec![button("buttons.transport.carpool", "ci:arr:carpool")],
        vec![button("buttons.transport.pickup", "ci:arr:pickup")],
    ];
    (i18n.t("checkin.arrival.prompt", lang, None), rows)
}

pub fn seats_keyboard() -> Rows {
    let seats: Vec<InlineKeyboardButton> = (0..=MAX_OFFERED_SEATS)
        .map(|n| InlineKeyboardButton::callback(n.to_string(), format!("ci:arr:own:{}", n)))
        .collect();
    seats.chunks(4).map(<[InlineKeyboardButton]>::to_vec).collect()
}

pub fn property_view(options: &[PropertyOption], i18n: &I18n, lang: &str, currency: &str) -> (String, Rows) {
    if options.is_empty() {
        return (i18n.t("checkin.property.none_available", lang, None), Vec::new());
    }

    let mut lines = vec![i18n.t("checkin.property.prompt", lang, None)];
    let mut rows = Vec::new();
    for option in options {
        let key = if option.current { "checkin.property.option_current" } else { "checkin.property.option" };
        lines.push(i18n.t_with(key, lang, &[
            ("name", option.property.name.clone()),
            ("beds", option.beds_left.to_string()),
            ("quote", format_money(option.quote, currency)),
        ]));
        rows.push(vec![InlineKeyboardButton::callback(
            option.property.name.clone(),
            format!("ci:prop:{}", option.property.id),
        )]);
    }

    (lines.join("\n"), rows)
}

pub fn payment_view(draft: &CheckInDraft, i18n: &I18n, lang: &str, currency: &str) -> (String, Rows) {
    let total = draft.total_amount.unwrap_or(Decimal::ZERO);
    if let Some(method) = draft.settled_method() {
        let text = i18n.t_with("checkin.payment.already_paid", lang, &[
            ("total", format_money(total, currency)),
            ("method", method.label().to_string()),
        ]);
        let rows = vec![vec![InlineKeyboardButton::callback(
            i18n.t_with("buttons.payment.settled", lang, &[("method", method.label().to_string())]),
            format!("ci:pay:full:{}", method.as_str()),
        )]];
        return (text, rows);
    }

    let text = i18n.t_with("checkin.payment.prompt", lang, &[("total", format_money(total, currency))]);
    let button = |key: &str, data: &str| InlineKeyboardButton::callback(i18n.t(key, lang, None), data.to_string());

    let rows = vec![
        vec![button("buttons.payment.full", "ci:pay:full")],
        vec![button("buttons.payment.partial", "ci:pay:partial")],
        vec![button("buttons.payment.later", "ci:pay:later")],
    ];
    (text, rows)
}

/// Method picker for a full or partial payment
pub fn methods_keyboard(kind: &str) -> Rows {
    let buttons: Vec<InlineKeyboardButton> = PaymentMethod::ALL
        .iter()
        .map(|m| InlineKeyboardButton::callback(m.label(), format!("ci:pay:{}:{}", kind, m.as_str())))
        .collect();
    buttons.chunks(3).map(<[InlineKeyboardButton]>::to_vec).collect()
}

pub fn summary_view(
    draft: &CheckInDraft,
    property: Option<&Property>,
    i18n: &I18n,
    lang: &str,
    currency: &str,
) -> (String, Rows) {
    let mut lines = Vec::new();

    if let (Some(arrival), Some(exit)) = (draft.arrival_date, draft.exit_date) {
        lines.push(i18n.t_with("checkin.summary.dates", lang, &[
            ("arrival", arrival.to_string()),
            ("exit", exit.to_string()),
            ("nights", draft.nights().unwrap_or(0).to_string()),
        ]));
    }
    if let Some(transport) = &draft.transport {
        lines.push(transport_line(transport, i18n, lang));
    }
    if let Some(property) = property {
        lines.push(i18n.t_with("checkin.summary.property", lang, &[("name", property.name.clone())]));
    }
    let total = draft.total_amount.unwrap_or(Decimal::ZERO);
    lines.push(i18n.t_with("checkin.summary.total", lang, &[("total", format_money(total, currency))]));
    if let Some(payment) = &draft.payment {
        lines.push(payment_line(payment, total, i18n, lang, currency));
    }

    let rows = vec![vec![InlineKeyboardButton::callback(
        i18n.t("buttons.finish", lang, None),
        "ci:finish",
    )]];
    (lines.join("\n"), rows)
}

fn transport_line(transport: &TransportChoice, i18n: &I18n, lang: &str) -> String {
    match transport {
        TransportChoice::OwnVehicle { seats } => i18n.t_with("checkin.summary.own_vehicle", lang, &[
            ("seats", seats.map_or_else(|| "0".to_string(), |s| s.to_string())),
        ]),
        TransportChoice::Flying { flight } => i18n.t_with("checkin.summary.flying", lang, &[
            ("flight", flight.number.clone()),
            ("arrival", format_timestamp(flight.arrival)),
        ]),
        TransportChoice::Carpool => i18n.t("checkin.summary.carpool", lang, None),
        TransportChoice::NeedsPickup { flight: Some(flight) } => i18n.t_with("checkin.summary.pickup_flight", lang, &[
            ("flight", flight.number.clone()),
            ("arrival", format_timestamp(flight.arrival)),
        ]),
        TransportChoice::NeedsPickup { flight: None } => i18n.t("checkin.summary.pickup", lang, None),
    }
}

fn payment_line(payment: &PaymentChoice, total: Decimal, i18n: &I18n, lang: &str, currency: &str) -> String {
    match payment {
        PaymentChoice::Full { method } => i18n.t_with("checkin.summary.paid_full", lang, &[
            ("method", method.label().to_string()),
        ]),
        PaymentChoice::Partial { method, amount } => i18n.t_with("checkin.summary.paid_partial", lang, &[
            ("amount", format_money(*amount, currency)),
            ("due", format_money(total - *amount, currency)),
            ("method", method.label().to_string()),
        ]),
        PaymentChoice::Later => i18n.t("checkin.summary.pay_later", lang, None),
    }
}
