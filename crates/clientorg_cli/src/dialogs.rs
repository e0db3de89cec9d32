//! Terminal implementation of the dialog seam.

use async_trait::async_trait;
use clientorg_core::{MessageDialogResult, MessageDialogService};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Prints messages to stdout and reads Ok/Cancel answers from stdin.
///
/// With `assume_ok` every question is answered `Ok` without reading input.
pub struct ConsoleDialogs {
    assume_ok: bool,
}

impl ConsoleDialogs {
    pub fn new(assume_ok: bool) -> Self {
        Self { assume_ok }
    }
}

#[async_trait]
impl MessageDialogService for ConsoleDialogs {
    async fn show_info(&self, message: &str) {
        println!("{message}");
    }

    async fn show_ok_cancel(&self, message: &str, title: &str) -> MessageDialogResult {
        if self.assume_ok {
            println!("{title}: {message} [ok]");
            return MessageDialogResult::Ok;
        }

        let mut stdout = io::stdout();
        let prompt = format!("{title}: {message} [o]k/[c]ancel: ");
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return MessageDialogResult::Cancel;
        }

        let mut line = String::new();
        let mut stdin = BufReader::new(io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => parse_answer(&line),
            Err(_) => MessageDialogResult::Cancel,
        }
    }
}

/// Anything but an explicit ok counts as cancel.
fn parse_answer(line: &str) -> MessageDialogResult {
    match line.trim().to_ascii_lowercase().as_str() {
        "o" | "ok" | "y" | "yes" => MessageDialogResult::Ok,
        _ => MessageDialogResult::Cancel,
    }
}
