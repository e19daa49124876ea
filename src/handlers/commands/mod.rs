//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /help, etc.

pub mod start;
pub mod checkin;
pub mod events;
pub mod admin;

use teloxide::{Bot, types::Message, utils::command::BotCommands};
use crate::i18n::I18n;
use crate::services::ServiceFactory;
use crate::state::StateStorage;
use crate::utils::errors::{CbxError, Result};

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "CBX Rentals commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Log in: /login <name> <phone>")]
    Login(String),
    #[command(description = "Log out")]
    Logout,
    #[command(description = "Show your booking and details")]
    Me,
    #[command(description = "Set your email: /email <address>")]
    Email(String),
    #[command(description = "Check in for the trip")]
    Checkin,
    #[command(description = "List upcoming events")]
    Events,
    #[command(description = "Admin panel (admin only)")]
    Admin,
    #[command(description = "Run a report (admin only)")]
    Report(String),
    #[command(description = "List attendees (admin only)")]
    Attendees,
    #[command(description = "Mark a booking paid: /markpaid <booking_id> <method> (admin only)")]
    MarkPaid(String),
    #[command(description = "Reset an attendee check-in: /resetcheckin <attendee_id> (admin only)")]
    ResetCheckin(String),
    #[command(description = "Assign a property: /assign <attendee_id> <property_id> <arrival> <exit> (admin only)")]
    Assign(String),
}

impl Command {
    /// Name used in logs and telemetry
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Login(_) => "login",
            Command::Logout => "logout",
            Command::Me => "me",
            Command::Email(_) => "email",
            Command::Checkin => "checkin",
            Command::Events => "events",
            Command::Admin => "admin",
            Command::Report(_) => "report",
            Command::Attendees => "attendees",
            Command::MarkPaid(_) => "markpaid",
            Command::ResetCheckin(_) => "resetcheckin",
            Command::Assign(_) => "assign",
        }
    }
}

/// Main command dispatcher
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    services: &ServiceFactory,
    state_storage: &StateStorage,
    i18n: &I18n,
) -> Result<()> {
    let user = msg.from.as_ref()
        .ok_or_else(|| CbxError::InvalidInput("No user in message".to_string()))?;
    let lang = super::user_language(i18n, user);
    let telegram_id = user.id.0 as i64;

    match cmd {
        Command::Start => start::handle_start(&bot, &msg, telegram_id, services, i18n, &lang).await,
        Command::Help => start::handle_help(&bot, &msg, telegram_id, services, i18n, &lang).await,
        Command::Login(args) => start::handle_login(&bot, &msg, telegram_id, &args, services, i18n, &lang).await,
        Command::Logout => start::handle_logout(&bot, &msg, telegram_id, services, i18n, &lang).await,
        Command::Me => start::handle_me(&bot, &msg, telegram_id, services, i18n, &lang).await,
        Command::Email(args) => start::handle_email(&bot, &msg, telegram_id, &args, services, i18n, &lang).await,
        Command::Checkin => checkin::handle_checkin(&bot, msg.chat.id, telegram_id, services, i18n, &lang).await,
        Command::Events => events::handle_events_list(&bot, msg.chat.id, telegram_id, services, i18n, &lang).await,
        Command::Admin => admin::handle_admin_panel(&bot, &msg, telegram_id, services, i18n, &lang).await,
        Command::Report(args) => admin::handle_report(&bot, msg.chat.id, telegram_id, &args, services, i18n, &lang).await,
        Command::Attendees => admin::handle_attendees(&bot, &msg, telegram_id, services, i18n, &lang).await,
        Command::MarkPaid(args) => admin::handle_mark_paid(&bot, &msg, telegram_id, &args, services, i18n, &lang).await,
        Command::ResetCheckin(args) => {
            admin::handle_reset_checkin(&bot, &msg, telegram_id, &args, services, state_storage, i18n, &lang).await
        }
        Command::Assign(args) => admin::handle_assign(&bot, &msg, telegram_id, &args, services, i18n, &lang).await,
    }
}
