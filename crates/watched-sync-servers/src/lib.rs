pub mod error;
pub mod factory;
pub mod jellyfin;
pub mod pool;
pub mod traits;

pub use error::SourceError;
pub use factory::create_servers;
pub use jellyfin::JellyfinServer;
pub use pool::run_bounded;
pub use traits::MediaServer;
