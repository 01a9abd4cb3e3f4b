//! Error taxonomy of the emulation layer.

use crate::event::EventFlags;

use std::io;
use thiserror::Error;

/// Errors reported by event creation, waiting, and the I/O wrappers.
///
/// A native timeout is not an error: `wait` reports it as `Ok(0)`
/// (zero events fired).
#[derive(Debug, Error)]
pub enum Error {
    /// The requested mode-flag combination is not supported.
    #[error("unsupported event mode flags: {0:?}")]
    UnsupportedCombination(EventFlags),

    /// Creating a native signal or timer object failed.
    #[error("native handle creation failed")]
    HandleCreation(#[source] io::Error),

    /// The ring stages more wait handles than the platform allows in
    /// one native multi-wait. No blocking call was performed.
    #[error("ring stages {staged} wait handles, platform ceiling is {ceiling}")]
    CapacityExceeded { staged: usize, ceiling: usize },

    /// Arming a timer failed. Timers are load-bearing, so this aborts
    /// the whole wait.
    #[error("failed to arm timer")]
    TimerArm(#[source] io::Error),

    /// The native multi-wait itself failed.
    #[error("native wait failed")]
    NativeWait(#[source] io::Error),

    /// An extra merged-in event fired while the caller's primary
    /// condition did not.
    #[error("wait interrupted by an extra event")]
    Interrupted,
}

impl From<Error> for io::Error {
    /// Maps emulation errors onto `io::Error` for the I/O wrappers,
    /// preserving the interrupt-style contract of [`Error::Interrupted`].
    fn from(err: Error) -> io::Error {
        match err {
            Error::Interrupted => io::Error::new(io::ErrorKind::Interrupted, err),
            Error::HandleCreation(e) | Error::NativeWait(e) | Error::TimerArm(e) => e,
            other => io::Error::other(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
