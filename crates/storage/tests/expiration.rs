use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Builder;
use tokio::time::{Duration, Instant, sleep};

use lapse_storage::{ExpiringMap, Expiration, Ttl};

/// Sem ninguém dirigindo o runtime, o timer não dispara: a chave atrasada
/// continua visível e contada até a coleta.
#[test]
fn overdue_key_stays_visible_until_timer_fires() {
    let rt = Builder::new_current_thread().enable_time().build().unwrap();
    let map = ExpiringMap::with_handle(rt.handle().clone());

    map.set("k".to_string(), 1u32, Some(Duration::from_millis(1)));
    std::thread::sleep(std::time::Duration::from_millis(10));

    assert!(map.contains_key("k"));
    assert_eq!(map.len(), 1);
    let entry = map.get_entry("k").unwrap();
    assert!(entry.is_expired());
    assert!(matches!(entry.ttl(), Ttl::Overdue(_)));
    assert!(map.ttl("k").unwrap().as_millis().unwrap() < 0);

    // Dirigir o runtime deixa a task de expiração rodar
    rt.block_on(async { sleep(Duration::from_millis(10)).await });
    assert!(!map.contains_key("k"));
    assert_eq!(map.len(), 0);
}

#[test]
fn maps_sharing_a_runtime_are_independent() {
    let rt = Builder::new_current_thread().enable_time().build().unwrap();
    let a = ExpiringMap::with_handle(rt.handle().clone());
    let b = ExpiringMap::with_handle(rt.handle().clone());

    a.set("k", 1, Some(Duration::from_millis(5)));
    b.set("k", 2, None);
    a.clear();

    rt.block_on(async { sleep(Duration::from_millis(20)).await });
    assert!(a.is_empty());
    assert_eq!(b.get("k"), Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_leave_stale_timers() {
    let map: ExpiringMap<String, usize> = ExpiringMap::new();
    let mut handles = Vec::new();

    for worker in 0..4 {
        let map = map.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..250 {
                let key = format!("key:{}", i % 10);
                map.set(key.clone(), worker * 1000 + i, Some(Duration::from_millis(500)));
                if i % 3 == 0 {
                    map.set_ttl(&key, None);
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    // Todo record com deadline tem exatamente um timer
    let with_deadline = map
        .full_values()
        .filter(|e| e.expires_at().is_some())
        .count();
    assert_eq!(map.pending_timers(), with_deadline);

    // Persistir tudo: nenhum timer antigo pode remover as chaves
    for key in map.keys() {
        map.set_ttl(&key, None);
    }
    assert_eq!(map.pending_timers(), 0);
    let len = map.len();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(map.len(), len);
}

#[tokio::test(start_paused = true)]
async fn evictions_follow_deadline_order() {
    let map = ExpiringMap::new();
    map.set("slow", 1, Some(Duration::from_millis(300)))
        .set("fast", 2, Some(Duration::from_millis(100)))
        .set("forever", 3, None);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["slow", "forever"]);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["forever"]);
}

#[tokio::test(start_paused = true)]
async fn expire_at_reports_absolute_deadline() {
    let map = ExpiringMap::new();
    let start = Instant::now();
    map.set("k", "v", Some(Duration::from_millis(500)));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        map.expire_at("k"),
        Some(Expiration::At(start + Duration::from_millis(500)))
    );
    assert_eq!(map.ttl("k").and_then(|t| t.as_millis()), Some(300));
}

#[tokio::test(start_paused = true)]
async fn for_each_sees_only_live_keys() {
    let map = ExpiringMap::new();
    map.set("a", 1, Some(Duration::from_millis(10)))
        .set("b", 2, None)
        .set("c", 3, Some(Duration::from_millis(1000)));
    sleep(Duration::from_millis(20)).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    map.for_each(move |_, key, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert_ne!(*key, "a");
    });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
