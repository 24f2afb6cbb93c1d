mod api;
pub use api::*;

mod ping;
pub use ping::*;

mod device;
pub use device::*;

mod models;
pub use models::*;

mod commands;
pub use commands::*;
