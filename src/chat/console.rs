//! Interactive line client.
//!
//! Reads lines from stdin behind a `"> "` prompt and prints whatever the
//! server sends, prefixed with a carriage return so an in-progress
//! prompt line is overwritten rather than corrupted. `/connect` and
//! `/quit` are handled locally and never reach the server.

use std::io::Write;
use std::sync::Arc;

use futures::SinkExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{error, info, warn};

use super::codec::RawCodec;
use super::registry::Shutdown;
use crate::config::{NetConfig, MAX_MESSAGE_SIZE, MAX_SEND_TRIES, SEND_TIMEOUT};

/// Split one input line into wire-sized chunks. A continuation chunk
/// that happens to start with `/` gets that byte rewritten to `\` so a
/// split payload cannot turn into a command on the server.
fn into_chunks(line: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < line.len() {
        let mut end = (start + MAX_MESSAGE_SIZE).min(line.len());
        while !line.is_char_boundary(end) {
            end -= 1;
        }

        let mut chunk = line[start..end].to_owned();
        if start != 0 && chunk.starts_with('/') {
            chunk.replace_range(0..1, "\\");
        }
        chunks.push(chunk);
        start = end;
    }

    chunks
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Stdin reader: prompts, reads a line, strips trailing whitespace and
/// hands it to the main loop. Ends on EOF or when the main loop is gone.
async fn read_input(tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line.trim_end().to_owned()).is_err() {
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
}

/// Run the interactive client until `/quit`, EOF, server close, or
/// shutdown.
pub async fn run(config: NetConfig, shutdown: Shutdown) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(read_input(line_tx));

    let mut connection: Option<Framed<TcpStream, RawCodec>> = None;

    loop {
        match connection.as_mut() {
            None => {
                tokio::select! {
                    _ = shutdown.triggered() => break,

                    line = line_rx.recv() => {
                        let Some(line) = line else { break };
                        match line.as_str() {
                            "/quit" => break,
                            "/connect" => connection = try_connect(&config).await,
                            "" => {}
                            _ => error!("Not connected"),
                        }
                    }
                }
            }

            Some(framed) => {
                tokio::select! {
                    _ = shutdown.triggered() => break,

                    line = line_rx.recv() => {
                        let Some(line) = line else { break };
                        match line.as_str() {
                            "/quit" => break,
                            "/connect" => info!("Already connected"),
                            "" => {}
                            _ => {
                                for chunk in into_chunks(&line) {
                                    if !send_chunk(framed, chunk).await {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                    }

                    inbound = framed.next() => match inbound {
                        Some(Ok(message)) => {
                            print!("\r{message}\n");
                            prompt();
                        }
                        Some(Err(e)) => {
                            error!("receive failed: {e}");
                            break;
                        }
                        None => {
                            println!("\rConnection closed from the server!");
                            break;
                        }
                    },
                }
            }
        }
    }

    Ok(())
}

async fn try_connect(config: &NetConfig) -> Option<Framed<TcpStream, RawCodec>> {
    info!("connecting to {}:{}", config.host, config.port);
    match TcpStream::connect((config.host.as_str(), config.port)).await {
        Ok(stream) => {
            info!("connected :)");
            Some(Framed::new(stream, RawCodec))
        }
        Err(e) => {
            error!("failed to connect: {e}");
            None
        }
    }
}

/// Same retry policy as the server's send path: buffer once, then flush
/// under the send timeout with a bounded number of attempts.
async fn send_chunk(framed: &mut Framed<TcpStream, RawCodec>, chunk: String) -> bool {
    let message = Arc::new(chunk);
    let mut tries = 0;

    loop {
        match timeout(SEND_TIMEOUT, framed.feed(Arc::clone(&message))).await {
            Ok(Ok(())) => break,
            Ok(Err(e)) => {
                error!("failed to send message: {e}");
                return false;
            }
            Err(_) => {
                tries += 1;
                if tries >= MAX_SEND_TRIES {
                    warn!("failed to send message (maximum tries reached)");
                    return false;
                }
            }
        }
    }

    loop {
        match timeout(SEND_TIMEOUT, framed.flush()).await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => {
                error!("failed to send message: {e}");
                return false;
            }
            Err(_) => {
                tries += 1;
                if tries >= MAX_SEND_TRIES {
                    warn!("failed to send message (maximum tries reached)");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_line_is_one_chunk() {
        assert_eq!(into_chunks("hello"), vec!["hello"]);
    }

    #[test]
    fn empty_line_produces_no_chunks() {
        assert!(into_chunks("").is_empty());
    }

    #[test]
    fn long_line_splits_at_the_wire_cap() {
        let line = "a".repeat(MAX_MESSAGE_SIZE + 5);
        let chunks = into_chunks(&line);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), MAX_MESSAGE_SIZE);
        assert_eq!(chunks[1].len(), 5);
    }

    #[test]
    fn continuation_chunk_cannot_become_a_command() {
        let mut line = "a".repeat(MAX_MESSAGE_SIZE);
        line.push_str("/quit");
        let chunks = into_chunks(&line);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "\\quit");
    }

    #[test]
    fn split_respects_char_boundaries() {
        let mut line = "a".repeat(MAX_MESSAGE_SIZE - 1);
        line.push('é');
        line.push_str("tail");
        let chunks = into_chunks(&line);
        assert_eq!(chunks[0].len(), MAX_MESSAGE_SIZE - 1);
        assert!(chunks[1].starts_with('é'));
    }
}
