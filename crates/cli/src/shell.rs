use std::fmt;

use bytes::Bytes;
use tokio::time::Duration;
use tracing::debug;

use lapse_common::LapseResult;
use lapse_storage::{ExpiringMap, Ttl};

use crate::command::Command;

const HELP: &str = "\
SET key value [PX ms | EX s]
GET key | DEL key | EXISTS key
TTL key | EXPIRE key ms | PERSIST key
KEYS | ENTRIES | SIZE | CLEAR
HELP | QUIT";

/// Resposta de um comando, formatada para exibição humana.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Nil,
    Value(Bytes),
    Integer(i64),
    List(Vec<String>),
    Text(&'static str),
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Value(data) => write!(f, "{}", quote(data)),
            Reply::Integer(n) => write!(f, "(integer) {n}"),
            Reply::List(items) if items.is_empty() => write!(f, "(empty list)"),
            Reply::List(items) => {
                let lines: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{}) {item}", i + 1))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            Reply::Text(s) => write!(f, "{s}"),
            Reply::Error(s) => write!(f, "(error) {s}"),
        }
    }
}

fn quote(data: &Bytes) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => format!("\"{s}\""),
        Err(_) => format!("(binary) {} bytes", data.len()),
    }
}

/// Executa comandos contra um map em processo.
pub struct Shell {
    map: ExpiringMap<String, Bytes>,
    default_ttl: Option<Duration>,
}

impl Shell {
    pub fn new(map: ExpiringMap<String, Bytes>, default_ttl: Option<Duration>) -> Self {
        Self { map, default_ttl }
    }

    /// Cria o shell com um map novo no runtime atual.
    pub fn try_new(default_ttl: Option<Duration>) -> LapseResult<Self> {
        Ok(Self::new(ExpiringMap::try_new()?, default_ttl))
    }

    /// Faz o parse e executa uma linha tokenizada.
    /// `Ok(None)` quando o comando pede para encerrar o shell.
    pub fn handle(&self, tokens: &[String]) -> LapseResult<Option<Reply>> {
        match Command::parse(tokens)? {
            Command::Quit => Ok(None),
            cmd => Ok(Some(self.execute(cmd))),
        }
    }

    pub fn execute(&self, cmd: Command) -> Reply {
        debug!(?cmd, "executando comando");
        match cmd {
            Command::Get(key) => self.map.get(&key).map(Reply::Value).unwrap_or(Reply::Nil),
            Command::Set {
                key,
                value,
                expire_ms,
            } => {
                let ttl = expire_ms.map(Duration::from_millis).or(self.default_ttl);
                self.map.set(key, value, ttl);
                Reply::Ok
            }
            Command::Del(key) => Reply::Integer(self.map.remove(&key).into()),
            Command::Exists(key) => Reply::Integer(self.map.contains_key(&key).into()),
            // -2 ausente, -1 sem deadline; atrasadas aparecem como 0
            Command::Ttl(key) => Reply::Integer(match self.map.ttl(&key) {
                None => -2,
                Some(ttl) => ttl.as_millis().map(|ms| ms.max(0)).unwrap_or(-1),
            }),
            Command::Expire { key, ms } => {
                Reply::Integer(self.map.set_ttl(&key, Some(Duration::from_millis(ms))).into())
            }
            Command::Persist(key) => Reply::Integer(self.map.set_ttl(&key, None).into()),
            Command::Keys => Reply::List(self.map.keys().collect()),
            Command::Entries => Reply::List(
                self.map
                    .full_entries()
                    .map(|(key, entry)| {
                        let ttl = match entry.ttl() {
                            Ttl::Never => "never".to_string(),
                            Ttl::Remaining(d) => format!("{}ms", d.as_millis()),
                            Ttl::Overdue(_) => "expiring".to_string(),
                        };
                        format!("{key} => {} ({ttl})", quote(entry.value()))
                    })
                    .collect(),
            ),
            Command::Size => Reply::Integer(i64::try_from(self.map.len()).unwrap_or(i64::MAX)),
            Command::Clear => {
                self.map.clear();
                Reply::Ok
            }
            Command::Help => Reply::Text(HELP),
            Command::Quit => Reply::Ok,
        }
    }
}
