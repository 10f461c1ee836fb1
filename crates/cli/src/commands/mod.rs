pub mod accounts;
pub mod assist;
pub mod recommendations;
