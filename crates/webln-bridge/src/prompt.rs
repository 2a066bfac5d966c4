//! Prompts answered on the terminal.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use webln_controller::{format_msat, PromptDecision, PromptKind, PromptRequest, PromptSurface};
use webln_core::WeblnError;

/// Asks on stdout and reads the answer from stdin.
///
/// Answers: `y [amount] [description...]`, `n`, or `block` to deny and
/// remember.
pub struct TerminalPrompt {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptSurface for TerminalPrompt {
    async fn prompt(&self, request: PromptRequest) -> Result<PromptDecision, WeblnError> {
        let mut lines = self.lines.lock().await;
        let mut stdout = tokio::io::stdout();
        let question = format!("{}\n[y/n/block] > ", describe(&request));

        loop {
            stdout
                .write_all(question.as_bytes())
                .await
                .map_err(|e| WeblnError::Internal(e.to_string()))?;
            stdout
                .flush()
                .await
                .map_err(|e| WeblnError::Internal(e.to_string()))?;

            let line = lines
                .next_line()
                .await
                .map_err(|e| WeblnError::Internal(e.to_string()))?;
            let Some(line) = line else {
                return Ok(PromptDecision::deny());
            };
            if let Some(decision) = parse_answer(&line) {
                return Ok(decision);
            }
        }
    }
}

/// One-paragraph description of what is being asked.
pub fn describe(request: &PromptRequest) -> String {
    let who = format!("{} ({})", request.origin.name, request.origin.domain);
    match &request.kind {
        PromptKind::Enable => format!("{} wants to connect to your wallet.", who),
        PromptKind::Pay { invoice, decoded } => match decoded {
            Some(decoded) => format!(
                "{} asks you to pay {} to {}\n  {}",
                who,
                decoded
                    .msatoshi
                    .map(format_msat)
                    .unwrap_or_else(|| "an amount of your choice".to_string()),
                decoded.nodeid,
                decoded.description.as_deref().unwrap_or("(no description)")
            ),
            None => format!("{} asks you to pay {}", who, invoice),
        },
        PromptKind::Invoice {
            options,
            proposed_amount,
            proposed_memo,
        } => {
            let bounds = match (options.minimum_amount, options.maximum_amount) {
                (Some(min), Some(max)) => format!(" (between {} and {} sat)", min, max),
                (Some(min), None) => format!(" (at least {} sat)", min),
                (None, Some(max)) => format!(" (at most {} sat)", max),
                (None, None) => String::new(),
            };
            format!(
                "{} requests an invoice for {} sat{}: \"{}\"",
                who, proposed_amount, bounds, proposed_memo
            )
        }
    }
}

/// Parse a terminal answer. `None` means ask again.
pub fn parse_answer(line: &str) -> Option<PromptDecision> {
    let mut words = line.split_whitespace();
    match words.next()?.to_ascii_lowercase().as_str() {
        "y" | "yes" => {
            let rest: Vec<&str> = words.collect();
            let (amount, description) = match rest.split_first() {
                Some((first, tail)) => match first.parse::<u64>() {
                    Ok(amount) => (Some(amount), tail.join(" ")),
                    Err(_) => (None, rest.join(" ")),
                },
                None => (None, String::new()),
            };
            Some(PromptDecision::Approve {
                amount,
                description: Some(description).filter(|d| !d.is_empty()),
            })
        }
        "n" | "no" => Some(PromptDecision::deny()),
        "block" => Some(PromptDecision::Deny { remember: true }),
        _ => None,
    }
}
