//! Protocol types shared by every layer.

pub mod hex_serde;
mod types;

pub use types::{Address, RoomId, TxContext};
