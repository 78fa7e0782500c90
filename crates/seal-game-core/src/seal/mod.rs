//! Off-chain encryption service stand-in.

mod mock;

pub use mock::{MockSealService, SealedDeck};
