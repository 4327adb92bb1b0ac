pub mod error;
pub mod media;
pub mod model;
pub mod store;

pub use error::{RoomError, RoomResult};
pub use store::RoomStore;
