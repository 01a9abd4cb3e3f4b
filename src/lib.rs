mod gate;
mod mux;
mod native;
mod utils;

pub mod error;
pub mod event;
pub mod fdset;
pub mod io;
pub mod runtime;
pub mod thread;
pub mod time;

pub use error::{Error, Result};
pub use event::{
    EventFlags, EventId, EventSpec, EventStatus, Events, Ring, SelectOutcome, SignalSet,
};
pub use fdset::{FdInterest, FdSet};
pub use native::{live_handles, Fd, Handle};
pub use thread::{spawn, Thread, ThreadAttr};
