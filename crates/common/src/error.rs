/// Erros do engine de armazenamento.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("nenhum runtime tokio ativo para agendar expirações")]
    NoRuntime,
}

/// Erros de parsing/validação de comandos do shell.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("comando desconhecido: {0}")]
    Unknown(String),
    #[error("número errado de argumentos para '{0}'")]
    WrongArity(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
}

/// Erro top-level do lapse.
#[derive(Debug, thiserror::Error)]
pub enum LapseError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Result type alias.
pub type LapseResult<T> = Result<T, LapseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display() {
        let err = StorageError::NoRuntime;
        assert_eq!(
            err.to_string(),
            "nenhum runtime tokio ativo para agendar expirações"
        );
    }

    #[test]
    fn command_error_display() {
        let err = CommandError::WrongArity("GET".into());
        assert_eq!(err.to_string(), "número errado de argumentos para 'GET'");
    }

    #[test]
    fn lapse_error_from_storage() {
        let err: LapseError = StorageError::NoRuntime.into();
        assert!(matches!(err, LapseError::Storage(StorageError::NoRuntime)));
    }

    #[test]
    fn lapse_error_from_command_is_transparent() {
        let err: LapseError = CommandError::Unknown("FOO".into()).into();
        assert!(matches!(err, LapseError::Command(CommandError::Unknown(_))));
        assert_eq!(err.to_string(), "comando desconhecido: FOO");
    }
}
