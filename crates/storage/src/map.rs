use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};

use lapse_common::StorageError;

use crate::entry::{Entry, Expiration, Ttl};
use crate::iter::Iter;
use crate::timer::TimerHandle;

/// Teto para deadlines que estourariam `Instant` (~30 anos, como o tokio).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline absoluto para `ttl` a partir de agora, sem overflow.
fn deadline_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Record interno por chave.
///
/// Invariante: `timer` é `Some` sse `expires_at` é `Some`.
struct Record<V> {
    value: V,
    expires_at: Option<Instant>,
    /// Posição na ordem de inserção. Mantida ao sobrescrever.
    position: u64,
    /// Identidade do record; o timer só remove a chave se ela ainda bater.
    generation: u64,
    timer: Option<TimerHandle>,
}

/// Tabela de records + ordem de inserção.
struct Table<K, V> {
    records: HashMap<K, Record<V>>,
    order: BTreeMap<u64, K>,
    next_id: u64,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Remove o record e sua posição. Dropar o record cancela o timer.
    fn remove<Q>(&mut self, key: &Q) -> Option<Record<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let record = self.records.remove(key)?;
        self.order.remove(&record.position);
        Some(record)
    }

    fn pending_timers(&self) -> usize {
        self.records.values().filter(|r| r.timer.is_some()).count()
    }

    fn snapshot<T>(&self, mut f: impl FnMut(&K, &Record<V>) -> T) -> Vec<T> {
        self.order
            .values()
            .filter_map(|key| self.records.get_key_value(key))
            .map(|(key, record)| f(key, record))
            .collect()
    }
}

/// Estado compartilhado entre os handles do map e as tasks de expiração.
struct SharedState<K, V> {
    table: Mutex<Table<K, V>>,
    runtime: Handle,
}

impl<K, V> SharedState<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Chamado pela task do timer ao disparar.
    fn expire(&self, key: &K, generation: u64) {
        let mut table = self.table.lock();

        // A chave pode ter sido removida ou re-setada desde o agendamento
        let is_current = table
            .records
            .get(key)
            .is_some_and(|r| r.generation == generation);
        if !is_current {
            trace!(generation, "timer obsoleto ignorado");
            return;
        }

        if let Some(mut record) = table.remove(key)
            && let Some(timer) = record.timer.take()
        {
            timer.disarm();
        }
        debug!(generation, "chave expirada removida");
    }
}

/// Map in-memory com TTL opcional por chave.
///
/// Cada chave com deadline tem exatamente uma task de expiração pendente no
/// runtime tokio. A expiração é dirigida pelo timer: leituras nunca checam o
/// deadline, então uma chave atrasada continua visível até o timer coletá-la.
///
/// `ExpiringMap` é um handle barato: clones compartilham o mesmo store.
pub struct ExpiringMap<K, V> {
    shared: Arc<SharedState<K, V>>,
}

impl<K, V> Clone for ExpiringMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Cria um map que agenda expirações no runtime atual.
    ///
    /// # Panics
    ///
    /// Se chamado fora de um runtime tokio. Use [`ExpiringMap::try_new`] ou
    /// [`ExpiringMap::with_handle`] nesse caso.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn try_new() -> Result<Self, StorageError> {
        Handle::try_current()
            .map(Self::with_handle)
            .map_err(|_| StorageError::NoRuntime)
    }

    /// Cria um map que agenda expirações no runtime de `runtime`.
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            shared: Arc::new(SharedState {
                table: Mutex::new(Table::new()),
                runtime,
            }),
        }
    }

    // --- Leitura ---

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.shared.table.lock();
        table.records.get(key).map(|r| r.value.clone())
    }

    pub fn get_entry<Q>(&self, key: &Q) -> Option<Entry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.shared.table.lock();
        table
            .records
            .get(key)
            .map(|r| Entry::new(r.value.clone(), r.expires_at))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.table.lock().records.contains_key(key)
    }

    /// Número de chaves presentes, incluindo as atrasadas ainda não coletadas.
    pub fn len(&self) -> usize {
        self.shared.table.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// TTL restante da chave. `None` se a chave não existe.
    pub fn ttl<Q>(&self, key: &Q) -> Option<Ttl>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.shared.table.lock();
        let record = table.records.get(key)?;
        Some(Ttl::until(record.expires_at, Instant::now()))
    }

    /// Deadline absoluto da chave. `None` se a chave não existe.
    pub fn expire_at<Q>(&self, key: &Q) -> Option<Expiration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.shared.table.lock();
        table.records.get(key).map(|r| r.expires_at.into())
    }

    /// Quantidade de timers de expiração armados.
    pub fn pending_timers(&self) -> usize {
        self.shared.table.lock().pending_timers()
    }

    // --- Escrita ---

    /// Grava `value` em `key`. Sem `ttl` a chave nunca expira; `ttl` zero
    /// expira no próximo tick do scheduler.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) -> &Self {
        let expires_at = ttl.map(deadline_after);
        let mut table = self.shared.table.lock();
        self.write(&mut table, key, value, expires_at);
        self
    }

    /// Troca o TTL de uma chave existente, mantendo o valor.
    /// `None` torna a chave permanente. Retorna `false` se a chave não existe.
    pub fn set_ttl<Q>(&self, key: &Q, ttl: Option<Duration>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expires_at = ttl.map(deadline_after);
        let mut table = self.shared.table.lock();
        let Some((key, value)) = table
            .records
            .get_key_value(key)
            .map(|(k, r)| (k.clone(), r.value.clone()))
        else {
            return false;
        };
        self.write(&mut table, key, value, expires_at);
        true
    }

    /// Como [`ExpiringMap::set_ttl`], a partir de um instante absoluto.
    /// Instantes no passado expiram no próximo tick.
    pub fn set_expire_at<Q>(&self, key: &Q, at: Option<Instant>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let ttl = at.map(|at| at.saturating_duration_since(Instant::now()));
        self.set_ttl(key, ttl)
    }

    /// Remove a chave e cancela seu timer. Retorna `true` se havia record.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.shared.table.lock().remove(key);
        if let Some(record) = &removed
            && record.timer.is_some()
        {
            trace!(generation = record.generation, "timer cancelado");
        }
        removed.is_some()
    }

    /// Remove todas as chaves e cancela todos os timers.
    pub fn clear(&self) {
        let mut table = self.shared.table.lock();
        let cancelled = table.pending_timers();
        table.records.clear();
        table.order.clear();
        debug!(cancelled, "map limpo");
    }

    /// Caminho único de escrita: cancela o timer anterior, grava o record e
    /// arma um novo timer se houver deadline. O deadline já vem calculado,
    /// então nada aqui pode falhar depois de remover o record anterior.
    fn write(&self, table: &mut Table<K, V>, key: K, value: V, expires_at: Option<Instant>) {
        // Dropar o record anterior aborta o timer dele
        let position = match table.records.remove(&key) {
            Some(previous) => previous.position,
            None => {
                let position = table.next_id();
                table.order.insert(position, key.clone());
                position
            }
        };

        let generation = table.next_id();
        let timer = expires_at.map(|deadline| self.arm(key.clone(), generation, deadline));

        table.records.insert(
            key,
            Record {
                value,
                expires_at,
                position,
                generation,
                timer,
            },
        );
    }

    fn arm(&self, key: K, generation: u64, deadline: Instant) -> TimerHandle {
        // Weak: um timer pendente não mantém o map vivo
        let state: Weak<SharedState<K, V>> = Arc::downgrade(&self.shared);
        let task = self.shared.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(state) = state.upgrade() {
                state.expire(&key, generation);
            }
        });
        trace!(generation, "timer armado");
        TimerHandle::new(task.abort_handle())
    }

    // --- Iteração ---

    pub fn keys(&self) -> Iter<K> {
        let table = self.shared.table.lock();
        Iter::new(table.snapshot(|k, _| k.clone()))
    }

    pub fn values(&self) -> Iter<V> {
        let table = self.shared.table.lock();
        Iter::new(table.snapshot(|_, r| r.value.clone()))
    }

    pub fn entries(&self) -> Iter<(K, V)> {
        let table = self.shared.table.lock();
        Iter::new(table.snapshot(|k, r| (k.clone(), r.value.clone())))
    }

    /// Como [`ExpiringMap::entries`], com o deadline junto do valor.
    pub fn full_entries(&self) -> Iter<(K, Entry<V>)> {
        let table = self.shared.table.lock();
        Iter::new(table.snapshot(|k, r| (k.clone(), Entry::new(r.value.clone(), r.expires_at))))
    }

    pub fn full_values(&self) -> Iter<Entry<V>> {
        let table = self.shared.table.lock();
        Iter::new(table.snapshot(|_, r| Entry::new(r.value.clone(), r.expires_at)))
    }

    /// Chama `f(value, key, map)` para cada chave, em ordem de inserção.
    ///
    /// Itera sobre um snapshot sem segurar o lock, então `f` pode chamar o
    /// próprio map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&V, &K, &Self),
    {
        for (key, value) in self.entries() {
            f(&value, &key, self);
        }
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// # Panics
    ///
    /// Como [`ExpiringMap::new`]: se chamado fora de um runtime tokio.
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, V> IntoIterator for &'a ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    type Item = (K, V);
    type IntoIter = Iter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

impl<K, V> fmt::Debug for ExpiringMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.shared.table.lock();
        f.debug_struct("ExpiringMap")
            .field("len", &table.records.len())
            .field("pending_timers", &table.pending_timers())
            .finish()
    }
}
