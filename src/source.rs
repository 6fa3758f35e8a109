// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Credential Source
 * Streams candidate triples from an input list into a bounded queue
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::Credential;

/// Queue depth between the file reader and the worker pool. When full the
/// producer blocks on `send` until a worker frees a slot (backpressure).
pub const QUEUE_CAPACITY: usize = 10_000;

/// Parse one input line into a credential. Returns `None` for blank lines,
/// `#` comments, and lines that do not split into exactly three fields;
/// those are skipped silently and produce no trial result.
pub fn parse_line(line: &str) -> Option<Credential> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let parts: Vec<&str> = line.split(';').collect();
    if parts.len() != 3 {
        return None;
    }

    Some(Credential::new(
        parts[0].trim(),
        parts[1].trim(),
        parts[2].trim(),
    ))
}

/// Stream credentials from `path` into the queue until end of input or
/// cancellation. The sender is dropped on return, closing the queue so
/// downstream workers drain and exit.
pub async fn stream(
    path: String,
    tx: Sender<Credential>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let file = File::open(&path).await?;
    let mut lines = BufReader::with_capacity(64 * 1024, file).lines();
    let mut fed: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("credential source cancelled after {} lines", fed);
                return Ok(());
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else { break };

        let Some(cred) = parse_line(&line) else {
            skipped += 1;
            continue;
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("credential source cancelled while queue was full");
                return Ok(());
            }
            sent = tx.send(cred) => {
                if sent.is_err() {
                    // All receivers gone; nothing left to feed.
                    return Ok(());
                }
                fed += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("skipped {} malformed or comment lines", skipped);
    }
    debug!("credential source exhausted: {} credentials fed", fed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::sync::mpsc;

    #[test]
    fn parses_valid_triple() {
        let cred = parse_line("10.0.0.1;admin;admin").unwrap();
        assert_eq!(cred.host_spec, "10.0.0.1");
        assert_eq!(cred.username, "admin");
        assert_eq!(cred.password, "admin");
    }

    #[test]
    fn trims_fields_and_surrounding_whitespace() {
        let cred = parse_line("  10.0.0.1 ; admin ; s3cret  ").unwrap();
        assert_eq!(cred.host_spec, "10.0.0.1");
        assert_eq!(cred.password, "s3cret");
    }

    #[test]
    fn skips_blank_comment_and_malformed_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# 10.0.0.1;admin;admin").is_none());
        assert!(parse_line("bad-line").is_none());
        assert!(parse_line("a;b").is_none());
        assert!(parse_line("a;b;c;d").is_none());
    }

    #[tokio::test]
    async fn streams_only_valid_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.1;admin;admin").unwrap();
        writeln!(file, "bad-line").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.0.0.2;root;toor").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let cancel = CancellationToken::new();
        stream(
            file.path().to_string_lossy().into_owned(),
            tx,
            cancel,
        )
        .await
        .unwrap();

        let mut got = Vec::new();
        while let Some(cred) = rx.recv().await {
            got.push(cred.as_line());
        }
        assert_eq!(got, vec!["10.0.0.1;admin;admin", "10.0.0.2;root;toor"]);
    }

    #[tokio::test]
    async fn missing_input_file_is_an_error() {
        let (tx, _rx) = mpsc::channel(1);
        let result = stream(
            "/nonexistent/credentials.txt".to_string(),
            tx,
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cancellation_stops_the_producer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..100 {
            writeln!(file, "10.0.0.{};admin;admin", i).unwrap();
        }
        file.flush().unwrap();

        // Queue of 1 with no consumer: the producer must park on send and
        // still return promptly once cancelled.
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(stream(
            file.path().to_string_lossy().into_owned(),
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle).await;
        assert!(result.is_ok(), "producer did not observe cancellation");
    }
}
