//! `/start` registration and the main menu, plus the catch-all for
//! messages the bot does not understand.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::User;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;

use crate::common::{BotEnv, UpdateHandler};
use crate::{reply, store};

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "register and show the main menu.")]
    Start,

    #[command(description = "display this text.")]
    Help,

    #[command(description = "show bot version.")]
    Version,
}

pub fn command_handler() -> UpdateHandler {
    dptree::entry().filter_command::<Command>().endpoint(handle_command)
}

async fn handle_command(
    bot: Bot,
    env: Arc<BotEnv>,
    msg: Message,
    command: Command,
) -> Result<()> {
    let Some(user) = msg.from() else { return Ok(()) };
    let user = user.clone();
    let result = match command {
        Command::Start => cmd_start(&bot, &env, &msg, &user).await,
        Command::Help => {
            reply::send_screen(
                &bot,
                &env,
                msg.chat.id,
                user.id,
                escape(&Command::descriptions().to_string()),
                None,
            )
            .await;
            Ok(())
        }
        Command::Version => {
            reply::send_screen(
                &bot,
                &env,
                msg.chat.id,
                user.id,
                crate::VERSION,
                None,
            )
            .await;
            Ok(())
        }
    };
    if let Err(e) = result {
        reply::report_step_error(
            &bot,
            &env,
            msg.chat.id,
            user.id,
            msg.text().unwrap_or_default(),
            &e,
        )
        .await;
    }
    Ok(())
}

async fn cmd_start(
    bot: &Bot,
    env: &BotEnv,
    msg: &Message,
    user: &User,
) -> Result<()> {
    let (_, created) = env.transaction(|conn| {
        store::get_or_create_user(
            conn,
            user.id.into(),
            user.username.as_deref(),
        )
    })?;
    env.sessions.update(user.id, |s| {
        s.events = None;
        s.private = None;
    });

    let name = escape(user.username.as_deref().unwrap_or(&user.first_name));
    let greeting = if created {
        format!("Hi, {name}! 🎉 You are now registered.")
    } else {
        format!("Welcome back, {name}! 🔥")
    };
    reply::send_notice(bot, msg.chat.id, greeting).await;
    reply::send_main_menu(bot, env, msg.chat.id, user.id).await;
    log::info!("user {} started the bot", user.id);
    Ok(())
}

/// Endpoint for private-chat messages no other handler recognized.
pub async fn unknown_message(
    bot: Bot,
    env: Arc<BotEnv>,
    msg: Message,
) -> Result<()> {
    let Some(user) = msg.from() else { return Ok(()) };
    reply::send_notice(
        &bot,
        msg.chat.id,
        "⛔️ Unknown command. Please use the buttons below.",
    )
    .await;
    reply::send_main_menu(&bot, &env, msg.chat.id, user.id).await;
    Ok(())
}
