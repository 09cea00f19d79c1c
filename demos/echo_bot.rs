//! Echo Bot: a minimal TamTam bot that repeats every message back.
//!
//! Run with:
//! ```sh
//! TAMTAM_TOKEN=<your bot token> cargo run --example echo_bot
//! ```
//!
//! Messages are echoed with a "Again?" keyboard; pressing the button answers
//! the callback with a notification. Stop with Ctrl-C; the last marker is
//! printed so a restart can resume from it.

use tamtam_rs::builders::KeyboardBuilder;
use tamtam_rs::prelude::*;
use tamtam_rs::types::CallbackAnswer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for log output.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = ClientBuilder::from_env()?.build()?;
    let me = client.get_my_info().send().await?;
    info!(bot = %me.name, user_id = me.user_id, "Echo Bot started");

    let echo = client.clone();
    let answer = client.clone();
    let mut handlers = UpdateHandlers::new()
        .on_message_created(move |update| {
            let Some(chat_id) = update.message.recipient.chat_id else {
                return Ok(());
            };
            let text = update.message.text().unwrap_or("(no text)");
            let body = KeyboardBuilder::new()
                .callback("Again?", text)
                .attach_to(NewMessageBody::text(format!("Echo: {text}")));

            // Replies run in the background so the poll loop is not held up.
            let handle = echo
                .send_message(body, SendMessageOptions::to_chat(chat_id))
                .execute();
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    warn!(error = %e, chat_id, "Failed to send echo");
                }
            });
            Ok(())
        })
        .on_message_callback(move |update| {
            let payload = update.callback.payload.clone().unwrap_or_default();
            let reply = CallbackAnswer {
                notification: Some(format!("You said: {payload}")),
                ..Default::default()
            };
            let handle = answer
                .answer_on_callback(update.callback.callback_id.clone(), reply)
                .execute();
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Failed to answer callback");
                }
            });
            Ok(())
        })
        .on_bot_added(|update| {
            info!(chat_id = update.chat_id, by = %update.user.name, "Added to chat");
            Ok(())
        })
        .with_policy(UnhandledPolicy::Ignore);

    let config = PollerConfig::default()
        .with_types(vec![
            UpdateType::MessageCreated,
            UpdateType::MessageCallback,
            UpdateType::BotAdded,
        ])
        .with_batch_policy(BatchPolicy::SkipAndReport);
    let mut poller = client.poller(config);

    poller
        .run_until(&mut handlers, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("Stopped at marker {:?}", poller.marker());
    Ok(())
}
