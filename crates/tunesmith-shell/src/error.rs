//! Errors raised while wiring or waiting on the shell.

use tunesmith_protocol::Realm;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShellError {
    /// A session receiver was wired into the other realm's slot.
    #[error("{slot} slot was given a {got} session")]
    RealmMismatch { slot: Realm, got: Realm },

    /// The session context behind a receiver was dropped.
    #[error("{0} session closed")]
    SessionClosed(Realm),
}
