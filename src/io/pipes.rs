//! Registry of pipe descriptors with explicit readiness handles.
//!
//! Plain pipes cannot always be registered with the readiness
//! selector. A pipe subsystem that maintains its own manual-reset
//! notification objects can register them here; descriptor events
//! consult the registry before falling back to selector staging.

use crate::native::{Fd, Handle};

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Which end of the pipe a notification handle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Read,
    Write,
}

struct Registered {
    read: Option<Handle>,
    write: Option<Handle>,
}

// Handles are raw identifiers owned by the registering subsystem.
unsafe impl Send for Registered {}

static REGISTRY: LazyLock<Mutex<HashMap<Fd, Registered>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Registers readiness handles for a pipe descriptor.
///
/// `read` is signaled while the descriptor has data to read, `write`
/// while it accepts data. The handles stay owned by the caller and
/// replace any earlier registration for the same descriptor.
pub fn register(fd: Fd, read: Option<Handle>, write: Option<Handle>) {
    let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    registry.insert(fd, Registered { read, write });
}

/// Drops the registration for a pipe descriptor, if any.
pub fn unregister(fd: Fd) {
    let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    registry.remove(&fd);
}

/// The notification handle registered for `fd` in the given
/// direction.
pub(crate) fn lookup(fd: Fd, direction: Direction) -> Option<Handle> {
    let registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    let entry = registry.get(&fd)?;
    match direction {
        Direction::Read => entry.read,
        Direction::Write => entry.write,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_follows_direction() {
        register(900_001 as Fd, Some(7 as Handle), None);

        assert_eq!(lookup(900_001 as Fd, Direction::Read), Some(7 as Handle));
        assert_eq!(lookup(900_001 as Fd, Direction::Write), None);

        unregister(900_001 as Fd);
        assert_eq!(lookup(900_001 as Fd, Direction::Read), None);
    }
}
