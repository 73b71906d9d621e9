//! Terminal channel: one local visitor chatting over stdin/stdout.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "cli";
const PROMPT: &str = "vous> ";

/// Reads visitor answers line by line from stdin; bot replies go to stdout,
/// the input prompt to stderr so piped transcripts stay clean.
pub struct CliChannel {
    sender: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::with_sender("local-visitor")
    }

    /// Attribute every line to `sender` (one conversation per sender).
    pub fn with_sender(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward non-blank lines from `reader` as messages until EOF or until the
/// receiving side goes away.
fn spawn_line_reader<R>(reader: R, sender: String) -> mpsc::UnboundedReceiver<IncomingMessage>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = reader.lines();
        eprint!("{PROMPT}");

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let answer = line.trim();
                    if answer.is_empty() {
                        eprint!("{PROMPT}");
                        continue;
                    }
                    let msg = IncomingMessage::new(CHANNEL_NAME, &sender, answer);
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let rx = spawn_line_reader(BufReader::new(tokio::io::stdin()), self.sender.clone());

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        if msg.sender != self.sender {
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("no terminal attached for sender {}", msg.sender),
            });
        }
        println!("\nbot> {}\n", response.content);
        eprint!("{PROMPT}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reader_skips_blank_lines_and_trims() {
        let input = Cursor::new(b"  jane@firm.com \n\n   \nDupont\n".to_vec());
        let mut rx = spawn_line_reader(BufReader::new(input), "visitor".into());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "jane@firm.com");
        assert_eq!(first.sender, "visitor");
        assert_eq!(first.channel, "cli");

        assert_eq!(rx.recv().await.unwrap().content, "Dupont");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn respond_rejects_foreign_sender() {
        let channel = CliChannel::with_sender("visitor");
        let msg = IncomingMessage::new("cli", "someone-else", "bonjour");
        let err = channel
            .respond(&msg, OutgoingResponse::text("salut"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed { .. }));
    }
}
