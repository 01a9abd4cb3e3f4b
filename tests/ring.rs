use vigil::{EventSpec, Events, Ring};

fn three_events(events: &mut Events) -> (vigil::EventId, vigil::EventId, vigil::EventId) {
    let a = events.create(EventSpec::Timer { secs: 60, usecs: 0 }).unwrap();
    let b = events.create(EventSpec::Timer { secs: 60, usecs: 0 }).unwrap();
    let c = events.create(EventSpec::Timer { secs: 60, usecs: 0 }).unwrap();
    (a, b, c)
}

#[test]
fn merge_concatenates_and_deduplicates() {
    let mut events = Events::new();
    let (a, b, c) = three_events(&mut events);

    let mut ring = Ring::from(a);
    ring.merge(Ring::from(b));

    let mut other = Ring::from(b);
    other.merge(Ring::from(c));

    ring.merge(other);

    assert_eq!(ring.len(), 3);
    assert!(ring.contains(a));
    assert!(ring.contains(b));
    assert!(ring.contains(c));
}

#[test]
fn isolate_splits_a_member_out() {
    let mut events = Events::new();
    let (a, b, c) = three_events(&mut events);

    let mut ring = Ring::from(a);
    ring.merge(Ring::from(b));
    ring.merge(Ring::from(c));

    let split = ring.isolate(b).unwrap();
    assert!(split.is_singleton());
    assert!(split.contains(b));

    assert_eq!(ring.len(), 2);
    assert!(!ring.contains(b));
}

#[test]
fn isolate_refuses_singletons_and_strangers() {
    let mut events = Events::new();
    let (a, b, _) = three_events(&mut events);

    let mut ring = Ring::from(a);
    assert!(ring.isolate(a).is_none());

    ring.merge(Ring::from(b));
    let (_, _, stranger) = three_events(&mut events);
    assert!(ring.isolate(stranger).is_none());
    assert_eq!(ring.len(), 2);
}

#[test]
fn freeing_a_ring_empties_the_arena() {
    let mut events = Events::new();
    let (a, b, c) = three_events(&mut events);

    let mut ring = Ring::from(a);
    ring.merge(Ring::from(b));
    ring.merge(Ring::from(c));

    events.free_ring(ring);
    assert_eq!(events.live(), 0);
}
