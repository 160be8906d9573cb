use tokio::time::{Duration, Instant};

/// Tempo de vida restante de uma entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Sem deadline.
    Never,
    /// Deadline ainda no futuro.
    Remaining(Duration),
    /// Deadline já passou, mas o timer ainda não coletou a chave.
    Overdue(Duration),
}

impl Ttl {
    pub(crate) fn until(expires_at: Option<Instant>, now: Instant) -> Self {
        match expires_at {
            None => Ttl::Never,
            Some(t) if t >= now => Ttl::Remaining(t - now),
            Some(t) => Ttl::Overdue(now - t),
        }
    }

    /// TTL em milissegundos com sinal (negativo quando atrasado).
    /// `None` quando a entrada nunca expira.
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            Ttl::Never => None,
            Ttl::Remaining(d) => Some(i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
            Ttl::Overdue(d) => Some(-i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
        }
    }
}

/// Deadline absoluto de uma entrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    At(Instant),
}

impl From<Option<Instant>> for Expiration {
    fn from(expires_at: Option<Instant>) -> Self {
        expires_at.map(Expiration::At).unwrap_or(Expiration::Never)
    }
}

/// Entrada no store: valor + deadline opcional.
///
/// Imutável: mudar o TTL de uma chave produz uma nova `Entry`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    pub fn new(value: V, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn expiration(&self) -> Expiration {
        self.expires_at.into()
    }

    pub fn ttl(&self) -> Ttl {
        Ttl::until(self.expires_at, Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|t| t < Instant::now())
            .unwrap_or(false)
    }
}
