use std::{sync::Arc, thread};

use tally_core::guard::{lock_pair, lock_pair_with, Guarded, MutexKind, PairBackoff};
use tally_records::{Item, Ledger, Rarity};

const ITERATIONS : usize = 2000;

fn item(name: &str, kind: MutexKind) -> Item {
    let mut item = Item::new();
    item.initialize_with(name, 10, 1, Rarity::Common).unwrap();
    item.enable_thread_safety_with(kind).unwrap();
    item
}

fn run_opposing<F>(a: Arc<Item>, b: Arc<Item>, f: F)
where
    F: Fn(&Item, &Item) + Copy + Send + 'static
{
    let handles = [(a.clone(), b.clone()), (b, a)].into_iter().map(|(x, y)| {
        thread::spawn(move || {
            for _ in 0..ITERATIONS {
                f(&*x, &*y);
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn opposing_lock_pair() {
    let a = Arc::new(item("a", MutexKind::Fair));
    let b = Arc::new(item("b", MutexKind::Fair));

    run_opposing(a.clone(), b.clone(), |x, y| {
        let (x_guard, y_guard) = lock_pair(x, y).unwrap();
        assert!(x_guard.acquired() && y_guard.acquired());
        assert!(x.thread_safety().is_locked_by_current_thread());
        assert!(y.thread_safety().is_locked_by_current_thread());
    });

    assert!(!a.thread_safety().is_locked_by_current_thread());
    assert!(!b.thread_safety().is_locked_by_current_thread());
}

#[test]
fn opposing_assignments() {
    let a = Arc::new(item("a", MutexKind::Fair));
    let b = Arc::new(item("b", MutexKind::Reentrant));

    run_opposing(a.clone(), b.clone(), |dest, src| {
        dest.assign_from(src).unwrap();
        dest.add_quantity(1).unwrap();
    });

    // Every assignment copies the other stack, so both end up as one of the 2 names
    for item in [&a, &b] {
        let name = item.name().unwrap();
        assert!(name == "a" || name == "b");
    }
}

#[test]
fn opposing_swaps_keep_both_payloads() {
    let a = Arc::new(item("a", MutexKind::Fair));
    let b = Arc::new(item("b", MutexKind::Fair));

    run_opposing(a.clone(), b.clone(), |x, y| x.swap_with(y).unwrap());

    let mut names = [a.name().unwrap(), b.name().unwrap()];
    names.sort();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn same_instance_from_many_threads() {
    let a = Arc::new(item("a", MutexKind::Fair));

    let handles = (0..4).map(|_| {
        let a = a.clone();
        thread::spawn(move || {
            for _ in 0..ITERATIONS / 4 {
                let (first, second) = lock_pair(&*a, &*a).unwrap();
                assert!(first.acquired());
                assert!(!second.acquired());
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(a.equals(&a), Ok(true));
}

#[test]
fn opposing_ledger_appends() {
    let mut a = Ledger::new();
    let mut b = Ledger::new();
    for ledger in [&mut a, &mut b] {
        ledger.initialize().unwrap();
        ledger.enable_thread_safety().unwrap();
        ledger.push(1u8).unwrap();
    }
    let a = Arc::new(a);
    let b = Arc::new(b);

    let handles = [(a.clone(), b.clone()), (b.clone(), a.clone())].into_iter().map(|(x, y)| {
        thread::spawn(move || {
            for _ in 0..ITERATIONS {
                let (x_guard, y_guard) = lock_pair_with(&*x, &*y, &PairBackoff::DEFAULT).unwrap();
                drop((x_guard, y_guard));
                x.assign_from(&y).unwrap();
            }
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(a.equals(&b), Ok(true));
}
