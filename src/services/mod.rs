pub mod admin;
pub mod auth;
pub mod avatars;
pub mod bookings;
pub mod catalog;
pub mod listings;
pub mod metrics;
pub mod profiles;
pub mod reviews;
pub mod schools;
pub mod search;
