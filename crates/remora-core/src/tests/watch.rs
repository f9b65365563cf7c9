use crate::watch::MutationWatcher;

#[test]
fn single_insertion_arms_one_deadline() {
    let mut watcher = MutationWatcher::new(300);
    watcher.note_insertions(1000);
    assert_eq!(watcher.next_deadline(), Some(1300));
    assert!(!watcher.take_due(1299));
    assert!(watcher.take_due(1300));
    assert_eq!(watcher.next_deadline(), None);
}

#[test]
fn fifty_rapid_insertions_fire_exactly_once() {
    let mut watcher = MutationWatcher::new(300);
    for i in 0..50 {
        watcher.note_insertions(1000 + i);
    }
    assert_eq!(watcher.next_deadline(), Some(1300));

    let mut fired = 0;
    for now in 1000..2000 {
        if watcher.take_due(now) {
            fired += 1;
        }
    }
    assert_eq!(fired, 1);
}

#[test]
fn mutation_storm_cannot_starve_the_rescan() {
    let mut watcher = MutationWatcher::new(300);
    watcher.note_insertions(0);
    // Insertions keep arriving right up to the deadline; it must not slide.
    for now in 1..300 {
        watcher.note_insertions(now);
    }
    assert!(watcher.take_due(300));
}

#[test]
fn next_window_rearms_after_firing() {
    let mut watcher = MutationWatcher::new(300);
    watcher.note_insertions(0);
    assert!(watcher.take_due(300));

    watcher.note_insertions(500);
    assert_eq!(watcher.next_deadline(), Some(800));
    assert!(watcher.take_due(800));
}

#[test]
fn teardown_is_permanent() {
    let mut watcher = MutationWatcher::new(300);
    watcher.note_insertions(0);
    watcher.teardown();
    assert!(!watcher.is_active());
    assert!(!watcher.take_due(10_000));

    watcher.note_insertions(20_000);
    assert_eq!(watcher.next_deadline(), None);
}
