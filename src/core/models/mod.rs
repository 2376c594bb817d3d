pub mod day;
pub mod report;
pub mod session;
pub mod usage;
