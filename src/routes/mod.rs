pub mod admin;
pub mod assets;
pub mod auth;
pub mod avatars;
pub mod bookings;
pub mod health;
pub mod metrics;
pub mod profiles;
pub mod reviews;
pub mod schools;
pub mod services;
