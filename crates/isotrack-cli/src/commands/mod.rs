pub mod check_config;
pub mod restore;
pub mod run;
pub mod search;
