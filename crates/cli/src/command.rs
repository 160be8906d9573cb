use std::slice;

use bytes::Bytes;
use lapse_common::CommandError;

/// Comandos aceitos pelo shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get(String),
    Set {
        key: String,
        value: Bytes,
        expire_ms: Option<u64>,
    },
    Del(String),
    Exists(String),
    Ttl(String),
    Expire {
        key: String,
        ms: u64,
    },
    Persist(String),
    Keys,
    Entries,
    Size,
    Clear,
    Help,
    Quit,
}

impl Command {
    /// Faz o parse de uma linha já tokenizada em um Command.
    pub fn parse(tokens: &[String]) -> Result<Command, CommandError> {
        let Some((name, rest)) = tokens.split_first() else {
            return Err(CommandError::WrongArity(String::new()));
        };
        let name = name.to_uppercase();
        let mut parse = Parse::new(&name, rest);

        let cmd = match name.as_str() {
            "GET" => Command::Get(parse.single_key()?),
            "SET" => parse_set(&mut parse)?,
            "DEL" => Command::Del(parse.single_key()?),
            "EXISTS" => Command::Exists(parse.single_key()?),
            "TTL" => Command::Ttl(parse.single_key()?),
            "EXPIRE" => {
                let key = parse.next_string()?;
                let ms = parse.next_millis()?;
                parse.finish()?;
                Command::Expire { key, ms }
            }
            "PERSIST" => Command::Persist(parse.single_key()?),
            "KEYS" => parse.finish().map(|_| Command::Keys)?,
            "ENTRIES" => parse.finish().map(|_| Command::Entries)?,
            "SIZE" => parse.finish().map(|_| Command::Size)?,
            "CLEAR" => parse.finish().map(|_| Command::Clear)?,
            "HELP" => Command::Help,
            "QUIT" | "EXIT" => Command::Quit,
            _ => return Err(CommandError::Unknown(name.clone())),
        };

        Ok(cmd)
    }
}

fn parse_set(parse: &mut Parse) -> Result<Command, CommandError> {
    let key = parse.next_string()?;
    let value = Bytes::from(parse.next_string()?);
    let mut expire_ms = None;

    while parse.has_remaining() {
        let opt = parse.next_string()?.to_uppercase();
        match opt.as_str() {
            "PX" => expire_ms = Some(parse.next_millis()?),
            "EX" => {
                let secs = parse.next_millis()?;
                let ms = secs
                    .checked_mul(1000)
                    .ok_or_else(|| CommandError::InvalidArgument("EX fora do intervalo".into()))?;
                expire_ms = Some(ms);
            }
            _ => return Err(CommandError::InvalidArgument(format!("opção de SET: {opt}"))),
        }
    }

    Ok(Command::Set {
        key,
        value,
        expire_ms,
    })
}

/// Cursor sobre os argumentos de um comando.
struct Parse<'a> {
    name: &'a str,
    parts: slice::Iter<'a, String>,
}

impl<'a> Parse<'a> {
    fn new(name: &'a str, parts: &'a [String]) -> Self {
        Self {
            name,
            parts: parts.iter(),
        }
    }

    fn has_remaining(&self) -> bool {
        self.parts.len() > 0
    }

    fn next_string(&mut self) -> Result<String, CommandError> {
        self.parts
            .next()
            .cloned()
            .ok_or_else(|| CommandError::WrongArity(self.name.to_string()))
    }

    /// Inteiro não negativo; zero é aceito (expira no próximo tick).
    fn next_millis(&mut self) -> Result<u64, CommandError> {
        let s = self.next_string()?;
        s.parse()
            .map_err(|_| CommandError::InvalidArgument(format!("'{s}' não é um inteiro não negativo")))
    }

    fn single_key(&mut self) -> Result<String, CommandError> {
        let key = self.next_string()?;
        self.finish()?;
        Ok(key)
    }

    fn finish(&mut self) -> Result<(), CommandError> {
        if self.has_remaining() {
            return Err(CommandError::WrongArity(self.name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        let tokens: Vec<String> = line.split_whitespace().map(String::from).collect();
        Command::parse(&tokens)
    }

    #[test]
    fn parse_get() {
        assert_eq!(parse("get key").unwrap(), Command::Get("key".into()));
    }

    #[test]
    fn parse_set_without_ttl() {
        assert_eq!(
            parse("SET key value").unwrap(),
            Command::Set {
                key: "key".into(),
                value: Bytes::from("value"),
                expire_ms: None,
            }
        );
    }

    #[test]
    fn parse_set_px_and_ex() {
        assert!(matches!(
            parse("SET k v PX 250").unwrap(),
            Command::Set { expire_ms: Some(250), .. }
        ));
        assert!(matches!(
            parse("set k v ex 2").unwrap(),
            Command::Set { expire_ms: Some(2000), .. }
        ));
    }

    #[test]
    fn parse_set_zero_ttl_is_accepted() {
        assert!(matches!(
            parse("SET k v PX 0").unwrap(),
            Command::Set { expire_ms: Some(0), .. }
        ));
    }

    #[test]
    fn parse_set_negative_ttl() {
        assert!(matches!(
            parse("SET k v PX -5"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parse_set_unknown_option() {
        assert!(matches!(
            parse("SET k v NX"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parse_expire_and_persist() {
        assert_eq!(
            parse("EXPIRE k 100").unwrap(),
            Command::Expire {
                key: "k".into(),
                ms: 100
            }
        );
        assert_eq!(parse("PERSIST k").unwrap(), Command::Persist("k".into()));
    }

    #[test]
    fn parse_wrong_arity() {
        assert!(matches!(parse("GET"), Err(CommandError::WrongArity(n)) if n == "GET"));
        assert!(matches!(parse("DEL a b"), Err(CommandError::WrongArity(_))));
        assert!(matches!(parse("KEYS x"), Err(CommandError::WrongArity(_))));
    }

    #[test]
    fn parse_unknown_command() {
        assert!(matches!(parse("INCR k"), Err(CommandError::Unknown(n)) if n == "INCR"));
    }

    #[test]
    fn parse_quit_aliases() {
        assert_eq!(parse("quit").unwrap(), Command::Quit);
        assert_eq!(parse("EXIT").unwrap(), Command::Quit);
    }
}
