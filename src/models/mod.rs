pub mod auth;
pub mod booking;
pub mod catalog;
pub mod profile;
pub mod review;
pub mod school;
pub mod service;
