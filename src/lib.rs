pub mod accounts;
pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod lifecycle;
pub mod localization;
pub mod log_reporter;
pub mod migrations;
pub mod notify;
pub mod payments;
pub mod rate_limiters;
pub mod subtitle;
pub mod translator;
pub mod utils;
