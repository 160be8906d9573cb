mod command;
mod shell;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::Duration;
use tracing::info;

use lapse_common::{DEFAULT_LOG_FILTER, DEFAULT_PROMPT};

use crate::shell::{Reply, Shell};

#[derive(Parser, Debug)]
#[command(name = "lapse-cli", about = "lapse — shell para um map em memória com TTL")]
struct Args {
    /// TTL aplicado a SET sem PX/EX
    #[arg(long, value_name = "MS")]
    default_ttl_ms: Option<u64>,
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs vão para stderr para não misturar com as respostas
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let default_ttl = args.default_ttl_ms.map(Duration::from_millis);
    let shell = Shell::try_new(default_ttl)?;
    info!(?default_ttl, "shell iniciado");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(args.prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(input) = lines.next_line().await? else {
            break; // EOF
        };

        let tokens = tokenize(input.trim());
        if tokens.is_empty() {
            continue;
        }

        let reply = match shell.handle(&tokens) {
            Ok(Some(reply)) => reply,
            Ok(None) => break,
            Err(e) => Reply::Error(e.to_string()),
        };
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
    }

    info!("shell encerrado");
    Ok(())
}

/// Tokeniza a linha de input com suporte a strings quoted.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut quote_char = '"';
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            if c == quote_char {
                in_quote = false;
                // "" conta como token vazio
                if current.is_empty() && chars.peek().is_none_or(|n| n.is_whitespace()) {
                    tokens.push(String::new());
                }
            } else if c == '\\' {
                let escaped = match chars.peek() {
                    Some('n') => Some('\n'),
                    Some('t') => Some('\t'),
                    Some(&q) if matches!(q, '\\' | '"' | '\'') => Some(q),
                    _ => None,
                };
                match escaped {
                    Some(e) => {
                        current.push(e);
                        chars.next();
                    }
                    None => current.push(c),
                }
            } else {
                current.push(c);
            }
        } else if c == '"' || c == '\'' {
            in_quote = true;
            quote_char = c;
        } else if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
