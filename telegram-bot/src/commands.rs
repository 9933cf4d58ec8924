//! Telegram command set (spec §4.M): `/start /id /wake /status /watchdog`,
//! plus plain-text messages, which route "find master session → forward →
//! await tail → reply".

use std::sync::Arc;

use sqlx::PgPool;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use orch_core::agent_status::{query_agent_status, QueryAgentStatus};
use orch_core::terminal_bridge::TerminalBridge;

use crate::state;

const MASTER_AGENT_ID: &str = "master";
const FORWARD_TAIL_LINES: usize = 20;
const FORWARD_WAIT_SEC: u64 = 3;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "orchestration-bus bridge commands:")]
pub enum Command {
    #[command(description = "bind this chat to the bridge (first caller wins)")]
    Start,
    #[command(description = "show this chat's id")]
    Id,
    #[command(description = "discover the master session")]
    Wake,
    #[command(description = "agent-status summary from the monitor")]
    Status,
    #[command(description = "toggle the watchdog loop on/off")]
    Watchdog,
}

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, text.into()).await?;
    Ok(())
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    pool: PgPool,
    bridge: Arc<dyn TerminalBridge>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            let bound = state::bind_chat_if_unset(msg.chat.id.0).await;
            match bound {
                Ok(chat_id) if chat_id == msg.chat.id.0 => {
                    reply(&bot, &msg, "bridge bound to this chat").await?
                }
                Ok(_) => reply(&bot, &msg, "bridge is already bound to another chat").await?,
                Err(e) => reply(&bot, &msg, format!("could not persist binding: {e}")).await?,
            }
        }
        Command::Id => reply(&bot, &msg, format!("chat id: {}", msg.chat.id.0)).await?,
        Command::Wake => match bridge.list_sessions().await {
            Ok(sessions) => {
                let found = sessions.iter().find(|s| s.agent_id == MASTER_AGENT_ID);
                let text = match found {
                    Some(s) => format!("master session: {} ({})", s.session_id, s.agent_name),
                    None => "no master session found".to_string(),
                };
                reply(&bot, &msg, text).await?
            }
            Err(e) => reply(&bot, &msg, format!("list_sessions failed: {e}")).await?,
        },
        Command::Status => match query_agent_status(&pool, QueryAgentStatus::default()).await {
            Ok(agents) => {
                let summary = agents
                    .iter()
                    .map(|a| format!("{}: {}", a.agent_id, a.status))
                    .collect::<Vec<_>>()
                    .join("\n");
                let text = if summary.is_empty() { "no agents registered".to_string() } else { summary };
                reply(&bot, &msg, text).await?
            }
            Err(e) => reply(&bot, &msg, format!("status query failed: {e}")).await?,
        },
        Command::Watchdog => match state::toggle_watchdog().await {
            Ok(enabled) => {
                let text = if enabled { "watchdog enabled" } else { "watchdog disabled" };
                reply(&bot, &msg, text).await?
            }
            Err(e) => reply(&bot, &msg, format!("could not toggle watchdog: {e}")).await?,
        },
    }
    Ok(())
}

pub async fn handle_text(bot: Bot, msg: Message, bridge: Arc<dyn TerminalBridge>) -> ResponseResult<()> {
    if !state::is_authorized(msg.chat.id.0).await {
        reply(&bot, &msg, "unauthorized: send /start first").await?;
        return Ok(());
    }
    let Some(text) = msg.text() else { return Ok(()) };

    if let Err(e) = bridge.send_input(MASTER_AGENT_ID, text).await {
        reply(&bot, &msg, format!("forward to master failed: {e}")).await?;
        return Ok(());
    }

    tokio::time::sleep(std::time::Duration::from_secs(FORWARD_WAIT_SEC)).await;

    match bridge.read_output(Some(MASTER_AGENT_ID), false, FORWARD_TAIL_LINES).await {
        Ok(rows) => {
            let tail = rows
                .into_iter()
                .flat_map(|r| r.output)
                .collect::<Vec<_>>()
                .join("\n");
            let text = if tail.is_empty() { "(no output yet)".to_string() } else { tail };
            reply(&bot, &msg, text).await?
        }
        Err(e) => reply(&bot, &msg, format!("read_output failed: {e}")).await?,
    }
    Ok(())
}
