//! Descriptor events on pipes, which have no selector path and rely
//! on registered notification handles instead.

#![cfg(target_os = "linux")]

use vigil::io::pipes;
use vigil::{Error, EventSpec, Events, Ring};

fn os_pipe() -> (i32, i32) {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0);
    (fds[0], fds[1])
}

#[test]
fn registered_pipe_handles_drive_descriptor_events() {
    let (read_end, write_end) = os_pipe();

    // The notification handle a pipe subsystem would maintain: set
    // while the read end has data.
    let notify = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
    assert!(notify >= 0);
    pipes::register(read_end, Some(notify), None);

    let mut events = Events::new();
    let readable = events.create(EventSpec::FdReadable(read_end)).unwrap();

    unsafe {
        libc::write(write_end, b"x".as_ptr() as *const _, 1);
        let one: u64 = 1;
        libc::write(notify, &one as *const _ as *const _, 8);
    }

    let ring = Ring::from(readable);
    let fired = events.wait(&ring).unwrap();
    assert_eq!(fired, 1);
    assert!(events.occurred(readable));

    // Level-triggered through the registry too: nothing was drained,
    // so a second pass fires again.
    assert_eq!(events.wait(&ring).unwrap(), 1);

    events.free(readable);
    pipes::unregister(read_end);
    unsafe {
        libc::close(notify);
        libc::close(read_end);
        libc::close(write_end);
    }
}

#[test]
fn unregistered_pipes_cannot_be_staged() {
    let (read_end, write_end) = os_pipe();

    // A pipe is not a socket; without a registry entry the member is
    // skipped, and a ring with nothing staged cannot block.
    let mut events = Events::new();
    let readable = events.create(EventSpec::FdReadable(read_end)).unwrap();

    let err = events.wait(&Ring::from(readable)).unwrap_err();
    assert!(matches!(err, Error::NativeWait(_)));

    events.free(readable);
    unsafe {
        libc::close(read_end);
        libc::close(write_end);
    }
}
