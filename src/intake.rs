//! Intake loop — routes channel messages into lead conversations.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{Channel, IncomingMessage, OutgoingResponse};
use crate::conversation::{OutboundMessage, SessionId, SessionManager, TurnOutcome};
use crate::error::Error;

/// Slash commands understood on text channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Retry,
    Quit,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "/reset" | "/restart" => Some(Self::Reset),
            "/retry" => Some(Self::Retry),
            "/quit" | "/exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Drives one channel: each sender gets their own conversation, opened on
/// their first message.
pub struct IntakeAgent {
    sessions: Arc<SessionManager>,
    channel: Box<dyn Channel>,
}

impl IntakeAgent {
    pub fn new(sessions: Arc<SessionManager>, channel: Box<dyn Channel>) -> Self {
        Self { sessions, channel }
    }

    /// Run until Ctrl+C, `/quit`, or the channel closes.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channel.start().await?;
        let mut conversations: HashMap<(String, String), SessionId> = HashMap::new();

        tracing::info!(channel = self.channel.name(), "Intake agent listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            match self.handle_message(&mut conversations, &message).await {
                Ok(Some(messages)) if !messages.is_empty() => {
                    let text = messages
                        .iter()
                        .map(|m| m.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    let _ = self
                        .channel
                        .respond(&message, OutgoingResponse::text(text))
                        .await;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::info!("Quit command received, exiting...");
                    break;
                }
                Err(e) => {
                    tracing::error!("Error handling message: {}", e);
                    let _ = self
                        .channel
                        .respond(
                            &message,
                            OutgoingResponse::text(
                                "Une erreur est survenue. Tapez /reset pour recommencer.",
                            ),
                        )
                        .await;
                }
            }
        }

        self.channel.shutdown().await?;
        Ok(())
    }

    /// `Ok(None)` means shut down.
    async fn handle_message(
        &self,
        conversations: &mut HashMap<(String, String), SessionId>,
        msg: &IncomingMessage,
    ) -> Result<Option<Vec<OutboundMessage>>, Error> {
        let command = Command::parse(&msg.content);
        if command == Some(Command::Quit) {
            return Ok(None);
        }

        let key = msg.conversation_key();
        // A session may have ended (idle eviction) since we last saw this sender.
        let live = match conversations.get(&key) {
            Some(&id) => self.sessions.snapshot(id).await.is_ok().then_some(id),
            None => None,
        };
        let Some(id) = live else {
            let (id, opening) = self.sessions.open().await;
            tracing::debug!(session_id = %id, sender = %msg.sender, "New conversation");
            conversations.insert(key, id);
            if command.is_some() {
                return Ok(Some(opening));
            }
            // The first line may already answer the opening question. If it
            // doesn't (a greeting), the turn changed nothing and the visitor
            // just gets the question.
            let reply = self.sessions.handle(id, &msg.content).await?;
            if reply.outcome.as_ref().is_some_and(TurnOutcome::is_committed) {
                return Ok(Some(reply.messages));
            }
            return Ok(Some(opening));
        };

        let reply = match command {
            Some(Command::Reset) => self.sessions.reset(id).await?,
            Some(Command::Retry) => self.sessions.retry_handoff(id).await?,
            _ => self.sessions.handle(id, &msg.content).await?,
        };
        Ok(Some(reply.messages))
    }
}
