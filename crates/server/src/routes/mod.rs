pub mod admin;
pub mod auth;
pub mod exchanges;
pub mod messages;
pub mod reviews;
pub mod skills;
pub mod stats;
