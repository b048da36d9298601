//! Editing session, hex views and command line front-end for [`chunkedit`].
//!
//! This crate sits between a user and a [`chunkedit::ChunkStore`]: it keeps
//! track of which chunk is being viewed, turns hex text into bytes before
//! they reach the store, and reports save progress.
//!
//! # Example
//!
//! ```no_run
//! use chunkedit::{SaveOptions, StoreOptions};
//! use chunkedit_util::{Session, SilentProgress, hexview};
//!
//! let mut session = Session::open("image.bin", StoreOptions::default()).expect("failed to open");
//! println!("{}", session.info());
//! print!("{}", hexview::format_grid(session.current_data(), session.info().start));
//!
//! session.edit_byte(0, 0x7F);
//! session.next().expect("failed to move");
//! session
//!     .save_as("image-edited.bin", &SaveOptions::default(), SilentProgress)
//!     .expect("failed to save");
//! ```

pub mod command;
pub mod hexview;
pub mod progress;
pub mod session;

pub use self::hexview::{ChunkInfo, HexError};
pub use self::progress::{SaveProgress, SilentProgress};
pub use self::session::{Session, SessionError};

#[cfg(feature = "cli")]
pub use self::progress::ConsoleProgress;
