//! # PostPilot Channels
//! External service clients: the Dropbox file store backing config, state
//! and image folders, and the Instagram sessions used for posting.

pub mod dropbox;
pub mod instagram;

pub use dropbox::{FileStoreClient, RemoteFile};
pub use instagram::{InstagramSession, MediaRef};
