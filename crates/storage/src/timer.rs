use tokio::task::AbortHandle;

/// Handle de um timer de expiração pendente.
///
/// Pertence ao record da chave: dropar o handle aborta a task.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub(crate) fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// Desarma o handle sem abortar. Usado pela própria task ao disparar.
    pub(crate) fn disarm(mut self) {
        self.abort = None;
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        // Abortar uma task que já terminou é no-op
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}
