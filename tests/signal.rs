//! Signal-kind events. These share the process-wide pending-signal
//! slot and notification handle, so the tests take turns.

use std::sync::Mutex;

use vigil::{EventSpec, Events, Ring, SignalSet};

static SERIAL: Mutex<()> = Mutex::new(());

#[test]
fn delivered_signals_wake_and_report_their_number() {
    let _serial = SERIAL.lock().unwrap();

    let mut events = Events::new();
    let mut set = SignalSet::new();
    set.add(15);
    let signal = events.create(EventSpec::Signal(set)).unwrap();

    vigil::runtime::deliver_signal(15);

    let fired = events.wait(&Ring::from(signal)).unwrap();
    assert_eq!(fired, 1);
    assert_eq!(events.signal_number(signal), Some(15));

    events.free(signal);
}

#[test]
fn signals_outside_the_set_do_not_fire() {
    let _serial = SERIAL.lock().unwrap();

    let mut events = Events::new();
    let mut set = SignalSet::new();
    set.add(12);
    let signal = events.create(EventSpec::Signal(set)).unwrap();
    // A due timer bounds the pass; the wait must complete on it alone.
    let pacer = events.create(EventSpec::Timer { secs: 0, usecs: 0 }).unwrap();

    vigil::runtime::deliver_signal(10);

    let mut ring = Ring::from(signal);
    ring.merge(Ring::from(pacer));

    let fired = events.wait(&ring).unwrap();
    assert_eq!(fired, 1);
    assert!(events.occurred(pacer));
    assert!(!events.occurred(signal));
    assert_eq!(events.signal_number(signal), None);

    events.free_ring(ring);
}

#[test]
fn empty_sets_match_any_signal() {
    let _serial = SERIAL.lock().unwrap();

    let mut events = Events::new();
    let signal = events.create(EventSpec::Signal(SignalSet::new())).unwrap();

    vigil::runtime::deliver_signal(2);

    let fired = events.wait(&Ring::from(signal)).unwrap();
    assert_eq!(fired, 1);
    assert_eq!(events.signal_number(signal), Some(2));

    events.free(signal);
}
