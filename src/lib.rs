pub mod error;
pub mod hook;
pub mod report;
pub mod rules;
pub mod util;
