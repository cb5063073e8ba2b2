pub mod action;
pub mod identifiers;
pub mod media;
pub mod status;

pub use action::{ActionKind, SyncAction};
pub use identifiers::{IdentityToken, MediaIdentifiers};
pub use media::{LibraryData, MediaItem, Series, SourceRef, UserData, WatchedSnapshot};
pub use status::WatchedStatus;
