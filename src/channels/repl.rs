//! Interactive REPL channel with line editing.
//!
//! Uses rustyline for line editing, history, and tab-completion. Input is
//! read on a dedicated thread and forwarded as [`IncomingMessage`]s; the
//! async side dispatches them and prints the reply.
//!
//! ## Commands
//!
//! - `connect account` - Issue a link challenge
//! - `verify <accountId> <nonce> <signature>` - Prove control of the account
//! - `disconnect` - Remove the current link
//! - `status` - Show the linked account
//! - `{"intent": ...}` - Push extractor output through the trade gate
//! - `/help`, `/quit`

use std::borrow::Cow;
use std::path::PathBuf;

use rustyline::completion::Completer;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Editor, Helper};
use tokio::sync::{mpsc, oneshot};

use crate::agent::CommandOutcome;
use crate::app::{App, Reply};
use crate::channels::IncomingMessage;
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "repl";

const COMMANDS: &[&str] = &[
    "connect account",
    "verify ",
    "disconnect",
    "status",
    "/help",
    "/quit",
];

/// Rustyline helper for command completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = &line[..pos];
        if prefix.is_empty() {
            return Ok((0, vec![]));
        }
        let matches = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

/// Get the history file path (~/.tradegate/history).
fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tradegate")
        .join("history")
}

fn build_editor() -> Result<Editor<ReplHelper, DefaultHistory>, String> {
    let config = Config::builder()
        .history_ignore_dups(true)
        .map_err(|e| format!("invalid editor config: {e}"))?
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .build();
    let mut rl = Editor::with_config(config)
        .map_err(|e| format!("failed to initialize line editor: {e}"))?;
    rl.set_helper(Some(ReplHelper));
    Ok(rl)
}

fn print_help() {
    println!("  connect account                          issue a link challenge");
    println!("  verify <accountId> <nonce> <signature>   finish linking");
    println!("  disconnect                               remove the link");
    println!("  status                                   show the linked account");
    println!("  {{\"intent\":\"place_bet\",...}}              run extractor output through the gate");
    println!("  anything else                            READ/WRITE classification");
    println!("  /quit                                    exit");
}

/// Render a [`Reply`] for the terminal.
pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Reply::Link(Ok(outcome)) => match outcome {
            CommandOutcome::ChallengeIssued {
                nonce,
                message,
                expires_at_ms,
            } => format!(
                "Sign this message with your wallet, then run `verify <accountId> {nonce} <signature>` \
                 (expires at {expires_at_ms} ms):\n\n{message}"
            ),
            CommandOutcome::Linked { account_id } => format!("LINKED {account_id}"),
            CommandOutcome::Disconnected => "Account disconnected.".to_string(),
            CommandOutcome::Status {
                linked_account_id: Some(account_id),
            } => format!("Linked account: {account_id}"),
            CommandOutcome::Status {
                linked_account_id: None,
            } => "No account linked. Run `connect account` to start.".to_string(),
            CommandOutcome::Usage { usage } => format!("Usage: {usage}"),
        },
        Reply::Link(Err(code)) => format!("Rejected: {code}"),
        Reply::Trade(Ok(request)) => serde_json::to_string_pretty(request)
            .map(|json| format!("Trade request ready for execution:\n{json}"))
            .unwrap_or_else(|e| format!("Trade request ready ({e})")),
        Reply::Trade(Err(code)) => format!("Rejected: {code}"),
        Reply::Unrecognized => "Unrecognized intent; nothing to do.".to_string(),
        Reply::Classified(class) => class.to_string(),
    }
}

/// REPL channel bound to one authenticated identity.
pub struct ReplChannel {
    identity: String,
}

impl ReplChannel {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    /// Spawn the input thread. The receiver closes when the user quits.
    ///
    /// Fails if the line editor cannot be set up on the input thread.
    pub async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let (ready_tx, ready_rx) = oneshot::channel();
        let identity = self.identity.clone();

        std::thread::spawn(move || {
            let mut rl = match build_editor() {
                Ok(editor) => {
                    let _ = ready_tx.send(Ok(()));
                    editor
                }
                Err(reason) => {
                    let _ = ready_tx.send(Err(reason));
                    return;
                }
            };

            let hist_path = history_path();
            if let Some(parent) = hist_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(&hist_path);

            println!(
                "\x1b[1mtradegate\x1b[0m  signed in as {identity}. /help for commands, /quit to exit"
            );
            println!();

            loop {
                match rl.readline("\x1b[1;36m\u{203A}\x1b[0m ") {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match line.to_lowercase().as_str() {
                            "/quit" | "/exit" => break,
                            "/help" => {
                                print_help();
                                continue;
                            }
                            _ => {}
                        }

                        let msg = IncomingMessage::new(CHANNEL_NAME, identity.as_str(), line);
                        if tx.blocking_send(msg).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "REPL input failed; closing session");
                        break;
                    }
                }
            }

            let _ = rl.save_history(&hist_path);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(reason)) => Err(ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason,
            }),
            Err(_) => Err(ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "input thread exited before the editor was ready".to_string(),
            }),
        }
    }

    /// Dispatch every message through `app` until input ends.
    pub async fn run(&self, app: &App) -> Result<(), ChannelError> {
        let mut rx = self.start().await?;
        while let Some(msg) = rx.recv().await {
            let reply = app.dispatch(&msg, msg.received_at_ms()).await;
            println!("{}", render_reply(&reply));
            println!();
        }
        Ok(())
    }
}
