//! Staging of ring members into native wait handles.
//!
//! A [`Staging`] is built per wait pass and torn down when the pass
//! ends, whichever way it ends. Teardown detaches per-call selector
//! registrations and restores descriptor blocking modes, so an early
//! error return never leaks a registration.

use crate::error::{Error, Result};
use crate::event::{EventId, EventKind, Events};
use crate::fdset::{merge_interest, FdEntry, FdInterest};
use crate::io::pipes::{self, Direction};
use crate::native::sys;
use crate::native::{Fd, Handle};
use crate::runtime;

use log::{debug, warn};

/// One descriptor registered on a per-call selector, with whatever
/// state must be put back afterwards.
pub(crate) struct RestoreFd {
    pub(crate) fd: Fd,
    /// Union of the interests registered for this descriptor.
    pub(crate) mask: FdInterest,
    /// Blocking mode to restore, if it was changed for the pass.
    pub(crate) restore_mode: Option<bool>,
}

/// Per-slot teardown work.
pub(crate) enum Cleanup {
    None,
    /// A per-call selector to unwind: detach every descriptor, restore
    /// modes, close the selector.
    Selector {
        selector: Handle,
        fds: Vec<RestoreFd>,
    },
}

/// One staged ring member: the event it stands for and the native
/// handle the multi-wait blocks on.
pub(crate) struct Slot {
    pub(crate) event: EventId,
    pub(crate) handle: Handle,
    pub(crate) cleanup: Cleanup,
}

pub(crate) struct Staging {
    pub(crate) slots: Vec<Slot>,
}

impl Staging {
    /// Maps every waitable ring member to a native handle.
    ///
    /// Members that cannot be staged (mutex kind, descriptors no
    /// backend accepts) are skipped with a log entry rather than
    /// failing the whole pass; a failed timer arm is a hard error.
    pub(crate) fn build(events: &Events, members: &[EventId]) -> Result<Staging> {
        let mut staging = Staging { slots: Vec::with_capacity(members.len()) };

        for &id in members {
            let record = events.record(id);
            match &record.kind {
                EventKind::FdReadable(fd) => {
                    staging.stage_fd(id, *fd, FdInterest::READ, Direction::Read);
                }
                EventKind::FdWritable(fd) => {
                    staging.stage_fd(id, *fd, FdInterest::WRITE, Direction::Write);
                }
                EventKind::Timer { secs, usecs } => {
                    let handle = record.handle.expect("timer event without native timer");
                    sys::sys_timer_arm(handle, *secs, *usecs).map_err(Error::TimerArm)?;
                    staging.slots.push(Slot {
                        event: id,
                        handle,
                        cleanup: Cleanup::None,
                    });
                }
                EventKind::Signal { .. } => {
                    let handle = runtime::signal_event().map_err(Error::HandleCreation)?;
                    staging.slots.push(Slot {
                        event: id,
                        handle,
                        cleanup: Cleanup::None,
                    });
                }
                EventKind::Select { rfds, wfds, efds, .. } => {
                    staging.stage_select(id, rfds.as_ref(), wfds.as_ref(), efds.as_ref())?;
                }
                EventKind::Generic(handle) => {
                    staging.slots.push(Slot {
                        event: id,
                        handle: *handle,
                        cleanup: Cleanup::None,
                    });
                }
                EventKind::Mutex(handle) => {
                    // Mutex events only make sense alone; inside a
                    // multi-wait they are ignored.
                    warn!(
                        "mutex event {:?} (handle {:?}) skipped in multi-wait",
                        id, handle
                    );
                }
            }
        }

        Ok(staging)
    }

    /// Stages a single-descriptor readiness event.
    ///
    /// A registered pipe end supplies its own notification handle;
    /// anything else goes through a per-call selector. Failures skip
    /// the member instead of aborting the pass.
    fn stage_fd(&mut self, id: EventId, fd: Fd, mask: FdInterest, direction: Direction) {
        if let Some(handle) = pipes::lookup(fd, direction) {
            self.slots.push(Slot {
                event: id,
                handle,
                cleanup: Cleanup::None,
            });
            return;
        }

        if !sys::sys_is_socket(fd) {
            warn!(
                "descriptor {} is neither a registered pipe nor a socket, \
                 skipping event {:?}",
                fd, id
            );
            return;
        }

        let selector = match sys::sys_selector_create() {
            Ok(selector) => selector,
            Err(err) => {
                warn!("selector creation failed for fd event {:?}: {}", id, err);
                return;
            }
        };
        if let Err(err) = sys::sys_selector_add(selector, fd, mask) {
            warn!("cannot watch descriptor {} for event {:?}: {}", fd, id, err);
            sys::sys_selector_close(selector);
            return;
        }
        self.slots.push(Slot {
            event: id,
            handle: selector,
            cleanup: Cleanup::Selector {
                selector,
                fds: vec![RestoreFd {
                    fd,
                    mask,
                    restore_mode: None,
                }],
            },
        });
    }

    /// Stages a Select-kind event on one aggregate selector.
    ///
    /// Descriptors appearing in several sets are registered once with
    /// the union of their interests. Each descriptor is switched to
    /// non-blocking for the duration of the pass.
    fn stage_select(
        &mut self,
        id: EventId,
        rfds: Option<&crate::fdset::FdSet>,
        wfds: Option<&crate::fdset::FdSet>,
        efds: Option<&crate::fdset::FdSet>,
    ) -> Result<()> {
        let mut table: Vec<FdEntry> = Vec::new();
        merge_interest(&mut table, rfds, FdInterest::READ);
        merge_interest(&mut table, wfds, FdInterest::WRITE);
        merge_interest(&mut table, efds, FdInterest::EXCEPT);

        let selector = sys::sys_selector_create().map_err(Error::HandleCreation)?;
        let mut fds = Vec::with_capacity(table.len());

        for entry in table {
            let restore_mode = match sys::sys_fd_nonblocking(entry.fd, true) {
                Ok(was_nonblocking) if !was_nonblocking => Some(false),
                Ok(_) => None,
                Err(err) => {
                    debug!("cannot unblock descriptor {}: {}", entry.fd, err);
                    None
                }
            };
            if let Err(err) = sys::sys_selector_add(selector, entry.fd, entry.mask) {
                warn!(
                    "cannot watch descriptor {} for select event {:?}: {}",
                    entry.fd, id, err
                );
                if restore_mode == Some(false) {
                    let _ = sys::sys_fd_nonblocking(entry.fd, false);
                }
                continue;
            }
            fds.push(RestoreFd {
                fd: entry.fd,
                mask: entry.mask,
                restore_mode,
            });
        }

        self.slots.push(Slot {
            event: id,
            handle: selector,
            cleanup: Cleanup::Selector { selector, fds },
        });
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        for slot in &self.slots {
            if let Cleanup::Selector { selector, fds } = &slot.cleanup {
                for entry in fds {
                    sys::sys_selector_del(*selector, entry.fd);
                    if let Some(mode) = entry.restore_mode {
                        let _ = sys::sys_fd_nonblocking(entry.fd, mode);
                    }
                }
                sys::sys_selector_close(*selector);
            }
        }
    }
}
