pub mod events;
pub mod model;

pub use events::FeedMessage;
pub use model::{Auction, Bid, ProductDocument};
