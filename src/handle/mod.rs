//! Media handles
//!
//! A handle is a cheap, cloneable reference to a running media actor: a live
//! stream, an opened file or a proxied remote stream. The registry never owns
//! the actor. It keeps a handle plus a subscription to the actor's exit.
//!
//! ```text
//!   Handle (clone) ──► mpsc ──► HandleMailbox ──► actor body
//!        │                                            │
//!        └──── ExitWatch ◄──── watch ◄──── supervisor ┘
//! ```

pub mod actor;
pub mod command;
pub mod error;
pub mod starter;

pub use actor::{ExitWatch, Handle, HandleId, HandleMailbox};
pub use command::{ExitReason, HandleCommand, HandleStatus, InfoMap, MediaInfo, PlayRequest};
pub use error::{HandleError, StartError};
pub use starter::HandleStarter;
