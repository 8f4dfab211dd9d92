pub mod commands;
pub mod model;

pub use commands::{BidContext, BidPlaced, BidSubmitter, SubmitOutcome};
pub use model::{BidForm, BidPhase};
