//! Native resource accounting, kept in its own binary so no sibling
//! test creates handles while the deltas below are measured.

use vigil::{EventSpec, Events, Ring};

#[test]
fn freeing_events_releases_native_handles() {
    // Force the shared runtime resources into existence first so they
    // do not show up in the delta below.
    vigil::runtime::init().unwrap();

    let before = vigil::live_handles();
    let mut events = Events::new();
    let a = events.create(EventSpec::Timer { secs: 60, usecs: 0 }).unwrap();
    let b = events.create(EventSpec::Timer { secs: 60, usecs: 0 }).unwrap();
    let c = events.create(EventSpec::FdReadable(0)).unwrap();
    assert_eq!(vigil::live_handles(), before + 3);

    events.free(a);
    let mut rest = Ring::from(b);
    rest.merge(Ring::from(c));
    events.free_ring(rest);

    assert_eq!(vigil::live_handles(), before);

    // Dropping an arena releases whatever was never freed explicitly.
    let mut events = Events::new();
    events.create(EventSpec::Timer { secs: 60, usecs: 0 }).unwrap();
    drop(events);
    assert_eq!(vigil::live_handles(), before);
}
