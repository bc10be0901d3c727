pub mod business_day;
pub mod holdings;
pub mod run;
pub mod setup;
