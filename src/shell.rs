//! Interactive support shell.
//!
//! Reads one line at a time: slash commands are operator views over the
//! store, everything else is a customer request submitted to the pipeline.
//! The shell is the trust boundary for output: it prints only the decrypted
//! reply and keeps the placeholder draft out of the conversation. Expected
//! pipeline failures are reported differently from broken invariants.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::actions;
use crate::cryptor::Cryptor;
use crate::pipeline::{AgentReply, Pipeline, PipelineError};
use crate::store::OrderStore;

/// One parsed line of shell input.
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Exit,
    Orders,
    Decrypt(&'a str),
    DecryptUsage,
    Db,
    History,
    Help,
    Empty,
    Request(&'a str),
}

/// Classify a line. Slash commands are matched case-insensitively; the
/// order identifier keeps its original case.
fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let lower = line.to_lowercase();
    match lower.as_str() {
        "/exit" => return Command::Exit,
        "/orders" => return Command::Orders,
        "/db" => return Command::Db,
        "/history" => return Command::History,
        "/help" => return Command::Help,
        _ => {}
    }

    if lower.starts_with("/decrypt") {
        let parts: Vec<&str> = line.split_whitespace().collect();
        return match parts.as_slice() {
            &[_, id] if id.starts_with("ORD-") => Command::Decrypt(id),
            _ => Command::DecryptUsage,
        };
    }

    Command::Request(line)
}

/// The operator-facing REPL around one [`Pipeline`].
pub struct Shell {
    pipeline: Pipeline,
    store: Arc<RwLock<OrderStore>>,
    cryptor: Arc<dyn Cryptor>,
    tenant_id: String,
    history: Vec<(String, String)>,
}

impl Shell {
    /// Assemble a shell over the pipeline and its shared collaborators.
    ///
    /// `tenant_id` scopes the operator `/decrypt` command, which runs
    /// outside any pipeline state.
    pub fn new(
        pipeline: Pipeline,
        store: Arc<RwLock<OrderStore>>,
        cryptor: Arc<dyn Cryptor>,
        tenant_id: String,
    ) -> Self {
        Self {
            pipeline,
            store,
            cryptor,
            tenant_id,
            history: Vec::new(),
        }
    }

    /// Read and handle lines until `/exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error only when the terminal itself fails; request
    /// failures are printed and the loop continues.
    pub async fn run(&mut self) -> Result<()> {
        println!("\nFlower Shop Customer Support");
        println!("Type /help to see the list of commands\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("➤ ");
            std::io::Write::flush(&mut std::io::stdout())?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if !self.handle_command(parse_command(&line)).await {
                break;
            }
        }
        Ok(())
    }

    /// Submit a single request and exit, for scripted use.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails, after reporting the failure
    /// the same way the interactive loop would.
    pub async fn run_once(&mut self, input: &str) -> Result<()> {
        if let Err(e) = self.submit(input).await {
            Self::report_failure(&e);
            anyhow::bail!("request failed");
        }
        Ok(())
    }

    /// Handle one parsed command. Returns false when the shell should stop.
    async fn handle_command(&mut self, command: Command<'_>) -> bool {
        match command {
            Command::Exit => {
                info!("session ended by user");
                println!("Goodbye!");
                false
            }
            Command::Empty => true,
            Command::Orders => {
                self.show_orders().await;
                true
            }
            Command::Decrypt(order_id) => {
                self.show_decrypted(order_id).await;
                true
            }
            Command::DecryptUsage => {
                println!("ERROR: usage /decrypt ORD-XXX\n");
                true
            }
            Command::Db => {
                self.show_raw_stores().await;
                true
            }
            Command::History => {
                self.show_history();
                true
            }
            Command::Help => {
                Self::show_help();
                true
            }
            Command::Request(text) => {
                if let Err(e) = self.submit(text).await {
                    Self::report_failure(&e);
                }
                true
            }
        }
    }

    /// Run one customer request and print the decrypted reply.
    async fn submit(&mut self, input: &str) -> Result<(), PipelineError> {
        let AgentReply { draft, reply } = self.pipeline.process(input).await?;
        debug!(
            draft_chars = draft.len(),
            "placeholder draft held back from customer output"
        );

        let shown = if reply.is_empty() {
            "(No final response)"
        } else {
            reply.as_str()
        };
        println!("\nAgent: {shown}\n");

        self.history.push((input.to_owned(), reply));
        Ok(())
    }

    /// Expected failures go to the conversation; broken invariants get a
    /// generic marker there and full detail in the operator log.
    fn report_failure(error: &PipelineError) {
        if error.is_unexpected() {
            error!(error = %error, "unexpected pipeline failure");
            println!("SYSTEM ERROR: unexpected issue occurred\n");
        } else {
            println!("PROCESSING ERROR: {error}\n");
        }
    }

    async fn show_orders(&self) {
        let store = self.store.read().await;
        if store.is_empty() {
            println!("\n[Storage] No orders stored yet.\n");
            return;
        }

        println!("\n[Storage] All orders (encrypted view):");
        println!("{}", "=".repeat(80));
        for (order_id, order) in store.iter() {
            println!("ID: {order_id}");
            println!("  Customer (PII): {}", order.customer);
            println!("  Items: {}", order.items);
            println!("  Status: {}", order.status);
            println!("{}", "-".repeat(80));
        }
        println!();
    }

    async fn show_decrypted(&self, order_id: &str) {
        let view = actions::lookup_order_decrypted(
            &self.store,
            self.cryptor.as_ref(),
            &self.tenant_id,
            order_id,
        )
        .await;

        println!("\n[Decrypt] Order {order_id} (plaintext view):");
        println!("{}", "=".repeat(80));
        match &view {
            Value::Object(fields) => {
                if let Some(reason) = fields.get("error").and_then(Value::as_str) {
                    println!("ERROR: {reason}");
                } else {
                    if let Some(reason) = fields.get("decrypt_error").and_then(Value::as_str) {
                        println!("DECRYPT ERROR: {reason}");
                    }
                    for (key, value) in fields {
                        println!("{key}: {}", display_value(value));
                    }
                }
            }
            other => println!("{other}"),
        }
        println!("{}\n", "=".repeat(80));
    }

    async fn show_raw_stores(&self) {
        let store = self.store.read().await;
        let orders = serde_json::to_string_pretty(&store.orders_snapshot()).unwrap_or_default();
        let bundles = serde_json::to_string_pretty(&store.bundles_snapshot()).unwrap_or_default();
        drop(store);

        println!("\n[Debug] orders store:");
        println!("{orders}");
        println!("\n[Debug] bundles store:");
        println!("{bundles}\n");
    }

    fn show_history(&self) {
        if self.history.is_empty() {
            println!("\n[History] Conversation is empty\n");
            return;
        }

        println!("\n[History] Conversation log:");
        println!("{}", "=".repeat(80));
        for (number, (question, answer)) in (1_usize..).zip(self.history.iter()) {
            println!("{number}. You: {question}");
            println!("   Agent: {answer}");
            println!("{}", "-".repeat(80));
        }
        println!();
    }

    fn show_help() {
        println!("\n[Help] Available commands:");
        println!("{}", "=".repeat(80));
        println!("/orders            - list encrypted orders");
        println!("/decrypt ID        - decrypt order by ID, e.g. /decrypt ORD-001");
        println!("/db                - dump the raw in-memory stores");
        println!("/history           - show previous prompts and answers");
        println!("/help              - this help screen");
        println!("/exit              - quit the shell");
        println!("\nSample prompts:");
        println!(
            "1. Create: Create an order for John Smith, john@example.com, +1-212-555-0100, Boston, 20 roses"
        );
        println!("2. Lookup: Show order ORD-001");
        println!("{}\n", "=".repeat(80));
    }
}

/// Strings print bare, everything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
