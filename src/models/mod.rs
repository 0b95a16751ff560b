pub mod candidate;
pub mod quote;
pub mod run;

pub use candidate::Candidate;
pub use quote::Quote;
pub use run::{DeliveryOutcome, DeliveryStatus, RunResult, RunState};
