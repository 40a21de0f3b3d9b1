//! Minimal terminal client for the realtime messaging channel.
//!
//! Connects with an existing session token, joins one conversation and
//! relays stdin lines as chat messages.
//!
//! Usage:
//!   chat_client <base-url> <session-token> <conversation-id>

use anyhow::{bail, Context, Result};
use gig_market::client::ChatClient;
use gig_market::websocket::types::ServerEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(base_url), Some(session_token), Some(conversation_id)) =
        (args.next(), args.next(), args.next())
    else {
        bail!("usage: chat_client <base-url> <session-token> <conversation-id>");
    };
    let conversation_id: Uuid = conversation_id
        .parse()
        .context("conversation id must be a UUID")?;

    let client = ChatClient::connect(&base_url, &session_token)
        .await
        .context("failed to connect")?;
    client.join_conversation(conversation_id).await?;
    println!("joined conversation {} — type to chat, /quit to exit", conversation_id);

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ServerEvent::NewMessage(message) => {
                    let name = message
                        .sender
                        .display_name
                        .or(message.sender.name)
                        .unwrap_or_else(|| message.sender.id.to_string());
                    println!(
                        "[{}] {}: {}",
                        message.created_at.format("%H:%M:%S"),
                        name,
                        message.content
                    );
                }
                ServerEvent::UserTyping { user_id, .. } => {
                    println!("... {} is typing", user_id);
                }
                ServerEvent::UserStoppedTyping { .. } => {}
                ServerEvent::UserOnline { user_id } => println!("* {} is online", user_id),
                ServerEvent::UserOffline { user_id } => println!("* {} went offline", user_id),
                ServerEvent::Error { message } => eprintln!("error: {}", message),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        client.keystroke(conversation_id).await;
        client.send_message(conversation_id, &line).await?;
    }

    client.leave_conversation(conversation_id).await.ok();
    Ok(())
}
