//! Integration tests for per-key exclusion.

use rastercache::lock::KeyedMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_exclusivity_holds_across_many_keys() {
    let locks = KeyedMutex::new();
    let occupied: Vec<AtomicBool> = (0..4).map(|_| AtomicBool::new(false)).collect();
    let violations = AtomicUsize::new(0);
    let runs = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..16usize {
            let (locks, occupied, violations, runs) = (&locks, &occupied, &violations, &runs);
            scope.spawn(move || {
                for round in 0..50usize {
                    let slot = (worker + round) % occupied.len();
                    let key = format!("gallery/{slot}.jpg");
                    locks
                        .try_execute(&key, Duration::from_secs(10), || {
                            if occupied[slot].swap(true, Ordering::SeqCst) {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::sleep(Duration::from_micros(200));
                            occupied[slot].store(false, Ordering::SeqCst);
                            runs.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 16 * 50);
    assert_eq!(locks.active_keys(), 0);
}

#[test]
fn test_timed_out_waiter_reports_key() {
    let locks = KeyedMutex::new();
    let guard = locks.lock("busy.png", Duration::from_secs(1)).unwrap();

    thread::scope(|scope| {
        let handle = scope.spawn(|| {
            locks.try_execute("busy.png", Duration::from_millis(20), || {
                panic!("must not run while held")
            })
        });
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.key, "busy.png");
        assert_eq!(err.timeout, Duration::from_millis(20));
    });

    drop(guard);
    assert!(locks.timeouts() >= 1);
    assert!(locks.try_execute("busy.png", Duration::ZERO, || true).unwrap());
}
