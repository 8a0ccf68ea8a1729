pub mod playthrough;
pub mod reports;
pub mod scenarios;
pub mod tester;

pub use scenarios::{Scenario, list_scenarios};
pub use tester::*;
