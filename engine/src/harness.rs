use minesweeper_common::protocol::{Command, GameEvent, ServerMessage};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{error::Result, session::Session};

async fn send<W: AsyncWrite + Unpin>(output: &mut W, message: &ServerMessage) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

async fn forward_pending<W: AsyncWrite + Unpin>(
    events: &mut mpsc::UnboundedReceiver<GameEvent>,
    output: &mut W,
) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        send(output, &ServerMessage::Event { event }).await?;
    }
    Ok(())
}

/// Drives `session` from JSON-lines commands on `input` and writes every
/// event, snapshot and error to `output`, one JSON object per line.
///
/// Returns at end of input, after stopping the timer and any running solve.
pub async fn run<R, W>(
    mut session: Session,
    mut events: mpsc::UnboundedReceiver<GameEvent>,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            biased;

            Some(event) = events.recv() => {
                send(&mut output, &ServerMessage::Event { event }).await?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let reply = match serde_json::from_str::<Command>(line) {
                    Ok(command) => {
                        debug!("Executing {:?}", command);
                        match session.execute(command).await {
                            Ok(Some(view)) => Some(ServerMessage::Snapshot { view }),
                            Ok(None) => None,
                            Err(e) => {
                                warn!("Command rejected: {}", e);
                                Some(ServerMessage::Error { message: e.to_string() })
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Ignoring malformed command {:?}: {}", line, e);
                        Some(ServerMessage::Error { message: e.to_string() })
                    }
                };

                // events caused by the command go out before its reply
                forward_pending(&mut events, &mut output).await?;
                if let Some(reply) = reply {
                    send(&mut output, &reply).await?;
                }
            }
        }
    }

    session.cancel_solve();
    session.stop_timer().await;
    forward_pending(&mut events, &mut output).await?;
    info!("Input closed, session ended");
    Ok(())
}
