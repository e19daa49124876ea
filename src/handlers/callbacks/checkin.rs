//! `ci:*` callbacks driving the check-in wizard

use std::str::FromStr;
use teloxide::{prelude::*, types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup}};
use tracing::{debug, info};
use crate::handlers::commands::checkin::{
    methods_keyboard, seats_keyboard, show_step, AwaitingInput, AWAITING_KEY,
};
use crate::i18n::I18n;
use crate::models::PaymentMethod;
use crate::services::{PaymentChoice, ServiceFactory, TransportChoice};
use crate::state::{CheckInStep, ConversationContext, StateStorage};
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::format_money;

/// A wizard button press
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInAction {
    KeepDates,
    /// `None` asks for the number of free seats
    OwnVehicle(Option<i32>),
    Flying,
    Carpool,
    Pickup,
    PickupWithoutFlight,
    Property(i64),
    /// `None` asks for the method
    PayFull(Option<PaymentMethod>),
    PayPartial(Option<PaymentMethod>),
    PayLater,
    Back,
    Cancel,
    Finish,
}

impl CheckInAction {
    /// Parse the part after `ci:`
    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split(':').collect();
        let method = |s: &str| PaymentMethod::from_str(s).ok();

        Some(match parts.as_slice() {
            ["dates", "keep"] => CheckInAction::KeepDates,
            ["arr", "own"] => CheckInAction::OwnVehicle(None),
            ["arr", "own", seats] => CheckInAction::OwnVehicle(Some(seats.parse().ok()?)),
            ["arr", "fly"] => CheckInAction::Flying,
            ["arr", "carpool"] => CheckInAction::Carpool,
            ["arr", "pickup"] => CheckInAction::Pickup,
            ["arr", "noflight"] => CheckInAction::PickupWithoutFlight,
            ["prop", id] => CheckInAction::Property(id.parse().ok()?),
            ["pay", "full"] => CheckInAction::PayFull(None),
            ["pay", "full", m] => CheckInAction::PayFull(Some(method(m)?)),
            ["pay", "partial"] => CheckInAction::PayPartial(None),
            ["pay", "partial", m] => CheckInAction::PayPartial(Some(method(m)?)),
            ["pay", "later"] => CheckInAction::PayLater,
            ["back"] => CheckInAction::Back,
            ["cancel"] => CheckInAction::Cancel,
            ["finish"] => CheckInAction::Finish,
            _ => return None,
        })
    }
}

fn flow_expired() -> CbxError {
    CbxError::InvalidStateTransition {
        from: "none".to_string(),
        to: "checkin".to_string(),
    }
}

async fn prompt(bot: &Bot, chat_id: ChatId, text: String, rows: Vec<Vec<InlineKeyboardButton>>) -> Result<()> {
    bot.send_message(chat_id, text).reply_markup(InlineKeyboardMarkup::new(rows)).await?;
    Ok(())
}

/// Remember that the next text message answers the current step
async fn await_text(
    context: &mut ConversationContext,
    pending: AwaitingInput,
    state_storage: &StateStorage,
) -> Result<()> {
    context.set_data(AWAITING_KEY, &pending)?;
    state_storage.save_context(context).await
}

pub async fn handle_checkin_callback(
    bot: &Bot,
    chat_id: ChatId,
    telegram_id: i64,
    data: &str,
    services: &ServiceFactory,
    state_storage: &StateStorage,
    i18n: &I18n,
    lang: &str,
) -> Result<()> {
    let action = CheckInAction::parse(data)
        .ok_or_else(|| CbxError::InvalidInput(format!("Unknown check-in action: {}", data)))?;
    let mut context = state_storage.load_context(telegram_id).await?.ok_or_else(flow_expired)?;
    let checkin = &services.checkin_service;
    if checkin.wizard().current_step(&context).is_none() {
        return Err(flow_expired());
    }
    debug!(telegram_id, action = ?action, "Check-in action");

    // A button press supersedes any typed answer the wizard was waiting for
    let had_pending = context.remove_data(AWAITING_KEY).is_some();
    if had_pending {
        state_storage.save_context(&context).await?;
    }

    let next = match action {
        CheckInAction::KeepDates => {
            let draft = checkin.wizard().draft(&context)?;
            let (Some(arrival), Some(exit)) = (draft.arrival_date, draft.exit_date) else {
                return Err(CbxError::InvalidInput("checkin.dates.invalid".to_string()));
            };
            checkin.submit_dates(&mut context, arrival, exit).await?;
            CheckInStep::Arrival
        }
        CheckInAction::OwnVehicle(None) => {
            return prompt(bot, chat_id, i18n.t("checkin.arrival.seats_prompt", lang, None), seats_keyboard()).await;
        }
        CheckInAction::OwnVehicle(Some(seats)) => {
            checkin.submit_arrival(&mut context, TransportChoice::OwnVehicle { seats: Some(seats) }).await?;
            CheckInStep::Property
        }
        CheckInAction::Flying => {
            await_text(&mut context, AwaitingInput::Flight, state_storage).await?;
            bot.send_message(chat_id, i18n.t("checkin.arrival.flight_prompt", lang, None)).await?;
            return Ok(());
        }
        CheckInAction::Carpool => {
            checkin.submit_arrival(&mut context, TransportChoice::Carpool).await?;
            CheckInStep::Property
        }
        CheckInAction::Pickup => {
            await_text(&mut context, AwaitingInput::PickupFlight, state_storage).await?;
            let rows = vec![vec![InlineKeyboardButton::callback(
                i18n.t("buttons.no_flight", lang, None),
                "ci:arr:noflight",
            )]];
            return prompt(bot, chat_id, i18n.t("checkin.arrival.pickup_prompt", lang, None), rows).await;
        }
        CheckInAction::PickupWithoutFlight => {
            checkin.submit_arrival(&mut context, TransportChoice::NeedsPickup { flight: None }).await?;
            CheckInStep::Property
        }
        CheckInAction::Property(property_id) => {
            checkin.submit_property(&mut context, property_id).await?;
            CheckInStep::Payment
        }
        CheckInAction::PayFull(None) => {
            return prompt(bot, chat_id, i18n.t("checkin.payment.method_prompt", lang, None), methods_keyboard("full")).await;
        }
        CheckInAction::PayPartial(None) => {
            return prompt(bot, chat_id, i18n.t("checkin.payment.method_prompt", lang, None), methods_keyboard("partial")).await;
        }
        CheckInAction::PayFull(Some(method)) => {
            checkin.submit_payment(&mut context, PaymentChoice::Full { method }).await?;
            CheckInStep::Complete
        }
        CheckInAction::PayPartial(Some(method)) => {
            let total = checkin.wizard().draft(&context)?.total_amount.unwrap_or_default();
            await_text(&mut context, AwaitingInput::PartialAmount { method }, state_storage).await?;
            let currency = &checkin.wizard().trip().currency;
            bot.send_message(chat_id, i18n.t_with("checkin.payment.amount_prompt", lang, &[
                ("total", format_money(total, currency)),
            ])).await?;
            return Ok(());
        }
        CheckInAction::PayLater => {
            checkin.submit_payment(&mut context, PaymentChoice::Later).await?;
            CheckInStep::Complete
        }
        CheckInAction::Back => {
            if had_pending {
                // Leaving a typed prompt returns to the same step's buttons
                checkin.wizard().current_step(&context).ok_or_else(flow_expired)?
            } else {
                checkin.back(&mut context).await?
            }
        }
        CheckInAction::Cancel => {
            checkin.cancel(&mut context).await?;
            bot.send_message(chat_id, i18n.t("checkin.cancelled", lang, None)).await?;
            return Ok(());
        }
        CheckInAction::Finish => {
            let (attendee, booking) = checkin.finish(&mut context).await?;
            info!(telegram_id, attendee_id = attendee.id, booking_id = booking.id, "Check-in completed from bot");
            let key = if booking.paid { "checkin.completed_paid" } else { "checkin.completed" };
            let currency = &checkin.wizard().trip().currency;
            bot.send_message(chat_id, i18n.t_with(key, lang, &[
                ("name", attendee.first_name().to_string()),
                ("due", format_money(booking.outstanding(), currency)),
            ])).await?;
            // Refresh the cached session record
            services.auth_service.refresh_attendee(telegram_id).await?;
            return Ok(());
        }
    };

    let draft = checkin.wizard().draft(&context)?;
    show_step(bot, chat_id, next, &draft, services, i18n, lang).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(CheckInAction::parse("dates:keep"), Some(CheckInAction::KeepDates));
        assert_eq!(CheckInAction::parse("arr:own"), Some(CheckInAction::OwnVehicle(None)));
        assert_eq!(CheckInAction::parse("arr:own:3"), Some(CheckInAction::OwnVehicle(Some(3))));
        assert_eq!(CheckInAction::parse("prop:12"), Some(CheckInAction::Property(12)));
        assert_eq!(
            CheckInAction::parse("pay:partial:cash_app"),
            Some(CheckInAction::PayPartial(Some(PaymentMethod::CashApp)))
        );
        assert_eq!(CheckInAction::parse("pay:full"), Some(CheckInAction::PayFull(None)));
        assert_eq!(CheckInAction::parse("finish"), Some(CheckInAction::Finish));
    }

    #[test]
    fn test_reject_malformed_actions() {
        assert_eq!(CheckInAction::parse("prop:abc"), None);
        assert_eq!(CheckInAction::parse("pay:full:bitcoin"), None);
        assert_eq!(CheckInAction::parse("arr:own:many"), None);
        assert_eq!(CheckInAction::parse(""), None);
        assert_eq!(CheckInAction::parse("dates"), None);
    }
}
