//! Time utilities built on timer events.

use crate::error::Result;
use crate::event::{EventSpec, Events, Ring};

use std::time::Duration;

/// Blocks the calling thread for `duration`.
///
/// This goes through the wait multiplexer like any other timer event,
/// so the runtime gate is released while the thread is parked.
pub fn sleep(duration: Duration) -> Result<()> {
    let mut events = Events::new();
    let timer = events.create(EventSpec::timer(duration))?;
    events.wait(&Ring::from(timer))?;
    events.free(timer);
    Ok(())
}
