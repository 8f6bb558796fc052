#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Restriction lints
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::deref_by_slicing,
    clippy::if_then_some_else_none,
    clippy::unnecessary_cast
)]
// False positives
#![allow(clippy::needless_pass_by_value)] // for dptree handlers
// Style
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use argh::FromArgs;
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message, Update};
use tokio_util::sync::CancellationToken;

use crate::common::BotEnv;

mod cache;
mod common;
mod config;
mod db;
mod keyboards;
mod models;
mod modules;
mod reply;
mod schema;
mod session;
mod store;
mod utils;

static VERSION: &str = git_version::git_version!(fallback = "unknown");

/// eventbot
#[derive(FromArgs, PartialEq, Debug)]
struct Args {
    /// config file
    #[argh(positional)]
    config_file: OsString,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    let args: Args = argh::from_env();
    log::info!("Version {VERSION}");
    run_bot(&args.config_file).await
}

async fn run_bot(config_path: &OsStr) -> Result<()> {
    let config: config::Config =
        serde_yaml::from_reader(File::open(config_path)?)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {e}"))?;
    let config = Arc::new(config);

    let bot_env = Arc::new(BotEnv {
        conn: Mutex::new(SqliteConnection::establish(&config.db)?),
        config: Arc::clone(&config),
        cache: cache::EventCache::new(cache::CACHE_LIFETIME),
        sessions: session::SessionStore::new(session::SESSION_LIFETIME),
    });

    let bot = Bot::new(&config.telegram.token);

    let mut dispatcher = Dispatcher::builder(
        bot.clone(),
        dptree::entry()
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.chat.is_private())
                    .branch(modules::start::command_handler())
                    .branch(modules::browse::selection_handler())
                    .endpoint(modules::start::unknown_message),
            )
            .branch(
                Update::filter_callback_query()
                    .branch(modules::browse::callback_handler())
                    .branch(modules::attendance::callback_handler())
                    .branch(modules::my_events::callback_handler())
                    .branch(modules::private::callback_handler())
                    .endpoint(drop_callback_query),
            ),
    )
    .dependencies(dptree::deps![Arc::clone(&bot_env)])
    .build();

    let bot_shutdown_token = dispatcher.shutdown_token();
    let cancel = CancellationToken::new();

    let mut join_handles = Vec::new();
    join_handles.push(tokio::spawn(async move { dispatcher.dispatch().await }));
    join_handles.push(tokio::spawn(session::sweep_task(
        Arc::clone(&bot_env),
        cancel.clone(),
    )));

    run_signal_handler(bot_shutdown_token, cancel);

    futures::future::join_all(join_handles).await;

    Ok(())
}

async fn drop_callback_query(
    bot: Bot,
    callback_query: CallbackQuery,
) -> Result<()> {
    log::warn!(
        "Unexpected callback query: {:?}",
        serde_json::to_string(&callback_query).unwrap_or_default()
    );
    bot.answer_callback_query(callback_query.id)
        .text("Unknown button. Please start over with /start.")
        .await?;
    Ok(())
}

fn run_signal_handler(
    bot_shutdown_token: teloxide::dispatching::ShutdownToken,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.expect("Failed to listen for SIGINT");
            cancel.cancel();
            match bot_shutdown_token.shutdown() {
                Ok(f) => {
                    log::info!(
                        "^C received, trying to shutdown the dispatcher..."
                    );
                    tokio::select! {
                        () = f => {
                            log::info!("dispatcher is shutdown...");
                        }
                        _ = tokio::signal::ctrl_c() => {
                            log::info!("Got another ^C, exiting immediately");
                            std::process::exit(0);
                        }
                    }
                }
                Err(_) => {
                    log::info!("^C received, the dispatcher isn't running, ignoring the signal");
                }
            }
        }
    });
}
