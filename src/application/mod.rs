pub mod app_error;
pub mod audit;
pub mod use_cases;
