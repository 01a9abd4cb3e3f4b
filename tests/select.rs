#![cfg(unix)]

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use vigil::{io, EventSpec, Events, FdSet, Ring};

fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    (client, server)
}

#[test]
fn only_the_active_descriptors_survive() {
    let (client, server) = tcp_pair();
    let client_fd = client.as_raw_fd();
    let server_fd = server.as_raw_fd();

    // No data in flight: the server socket is not readable, but a
    // fresh connected socket is writable right away.
    let rfds: FdSet = [server_fd].into_iter().collect();
    let wfds: FdSet = [client_fd].into_iter().collect();

    let mut events = Events::new();
    let select = events
        .create(EventSpec::Select {
            rfds: Some(rfds),
            wfds: Some(wfds),
            efds: None,
        })
        .unwrap();

    let fired = events.wait(&Ring::from(select)).unwrap();
    assert_eq!(fired, 1);

    let outcome = events.select_outcome(select).unwrap();
    assert_eq!(outcome.ready, 1);
    assert!(outcome.rfds.unwrap().is_empty());
    assert!(outcome.wfds.unwrap().contains(client_fd));
    assert!(outcome.efds.is_none());

    events.free(select);
}

#[test]
fn shared_descriptors_report_each_interest() {
    let (mut client, server) = tcp_pair();
    let server_fd = server.as_raw_fd();

    client.write_all(b"data").unwrap();
    client.flush().unwrap();

    // The same descriptor in both sets: after the write it is
    // readable, and a connected socket stays writable.
    let rfds: FdSet = [server_fd].into_iter().collect();
    let wfds: FdSet = [server_fd].into_iter().collect();

    let mut events = Events::new();
    let select = events
        .create(EventSpec::Select {
            rfds: Some(rfds),
            wfds: Some(wfds),
            efds: None,
        })
        .unwrap();

    events.wait(&Ring::from(select)).unwrap();

    let outcome = events.select_outcome(select).unwrap();
    assert_eq!(outcome.ready, 2);
    assert!(outcome.rfds.unwrap().contains(server_fd));
    assert!(outcome.wfds.unwrap().contains(server_fd));

    events.free(select);
}

#[test]
fn select_ev_narrows_the_caller_sets() {
    let (mut client, server) = tcp_pair();
    let server_fd = server.as_raw_fd();
    let client_fd = client.as_raw_fd();

    client.write_all(b"data").unwrap();
    client.flush().unwrap();

    let mut rfds: FdSet = [server_fd, client_fd].into_iter().collect();
    let mut events = Events::new();

    let ready = io::select_ev(&mut events, Some(&mut rfds), None, None, None, None).unwrap();
    assert_eq!(ready, 1);
    assert!(rfds.contains(server_fd));
    assert!(!rfds.contains(client_fd));
    assert_eq!(events.live(), 0);
}

#[test]
fn select_ev_timeout_clears_the_sets() {
    let (client, server) = tcp_pair();
    let _client = client;

    let mut rfds: FdSet = [server.as_raw_fd()].into_iter().collect();
    let mut events = Events::new();

    let ready = io::select_ev(
        &mut events,
        Some(&mut rfds),
        None,
        None,
        Some(Duration::from_millis(100)),
        None,
    )
    .unwrap();

    assert_eq!(ready, 0);
    assert!(rfds.is_empty());
    assert_eq!(events.live(), 0);
}
