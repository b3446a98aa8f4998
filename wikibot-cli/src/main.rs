//! wikibot-cli — terminal client for the wikibot HTTP API
//!
//! # Subcommands
//! - `chat`                     — interactive conversation, one line per turn
//! - `ask <message> [--json]`   — send a single turn
//! - `status`                   — show server health

use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8766";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "wikibot-cli",
    version,
    about = "Chat with the wikibot knowledge-base assistant"
)]
struct Cli {
    /// wikibot HTTP server URL (overrides WIKIBOT_HTTP_URL env var)
    #[arg(long, env = "WIKIBOT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an interactive conversation (type `exit` to leave)
    Chat {
        /// Show the reformulated query and matched articles after each answer
        #[arg(long)]
        details: bool,
    },

    /// Send one message and print the reply
    Ask {
        /// Message text
        message: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,

        /// Print the raw JSON response data
        #[arg(long)]
        json: bool,
    },

    /// Show wikibot server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleMatch {
    pub distance: f64,
    pub title: String,
    pub url: String,
}

/// `data` of a successful `POST /chat`
#[derive(Debug, Deserialize)]
pub struct ChatData {
    pub session_id: String,
    pub reply: String,
    pub route: String,
    pub english_query: Option<String>,
    #[serde(default)]
    pub matches: Vec<ArticleMatch>,
}

// ============================================================================
// Output formatting
// ============================================================================

/// Lookup details shown under a knowledge-base answer.
pub fn format_details(data: &ChatData) -> String {
    let Some(query) = &data.english_query else {
        return String::new();
    };

    let mut out = format!("比對內容: {}\n", query);
    for (i, m) in data.matches.iter().enumerate() {
        out.push_str(&format!("  {} {:.4}  {}  <{}>\n", i + 1, m.distance, m.title, m.url));
    }
    out
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | ":q")
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        // Knowledge-base answers chain several hosted-model calls
        .timeout(std::time::Duration::from_secs(120))
        .build()?)
}

/// Send one turn; returns the parsed `data` payload.
fn send_turn(
    client: &reqwest::blocking::Client,
    server: &str,
    session: Option<&str>,
    message: &str,
) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}/chat", server);
    let body = serde_json::json!({
        "session_id": session,
        "message": message,
    });

    let resp = client
        .post(&url)
        .json(&body)
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;

    let status = resp.status();
    let envelope: Envelope = resp
        .json()
        .map_err(|e| anyhow::anyhow!("failed to parse response (HTTP {}): {}", status, e))?;

    if envelope.status != "ok" {
        anyhow::bail!(
            "server returned {}: {}",
            status,
            envelope.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    envelope
        .data
        .ok_or_else(|| anyhow::anyhow!("response has no data"))
}

fn do_ask(server: &str, message: &str, session: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let client = client()?;
    let data = send_turn(&client, server, session, message)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let chat: ChatData = serde_json::from_value(data)?;
    println!("{}", chat.reply);
    eprintln!("(session {})", chat.session_id);
    Ok(())
}

fn do_chat(server: &str, details: bool) -> anyhow::Result<()> {
    let client = client()?;
    let mut session: Option<String> = None;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    println!("wikibot — type a message, or `exit` to leave.");
    loop {
        print!("輸入訊息: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            break;
        }

        match send_turn(&client, server, session.as_deref(), line) {
            Ok(data) => {
                let chat: ChatData = serde_json::from_value(data)?;
                session = Some(chat.session_id.clone());
                println!("\n🤖 {}\n", chat.reply);
                if details && chat.route == "knowledge_base" {
                    print!("{}", format_details(&chat));
                }
            }
            // Keep the loop alive; the next line may succeed
            Err(e) => eprintln!("wikibot-cli: {}", e),
        }
    }

    Ok(())
}

/// Show the server status by calling GET /health and GET /version.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let version: serde_json::Value = client
        .get(format!("{}/version", server))
        .send()
        .and_then(|r| r.json())
        .unwrap_or_default();

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) => {
            let code = r.status();
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("wikibot server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", version["version"].as_str().unwrap_or("?"));
            println!("Protocol:       {}", version["protocol"].as_str().unwrap_or("?"));
            if code.is_success() {
                println!("PostgreSQL:     {}", body["postgresql"].as_str().unwrap_or("?"));
                println!("pgvector:       {}", body["pgvector"].as_str().unwrap_or("?"));
            } else {
                eprintln!("wikibot-cli: server unhealthy (HTTP {}): {}", code, body["error"].as_str().unwrap_or("?"));
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("wikibot-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Chat { details } => do_chat(&server, details),
        Commands::Ask {
            message,
            session,
            json,
        } => do_ask(&server, &message, session.as_deref(), json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("wikibot-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
