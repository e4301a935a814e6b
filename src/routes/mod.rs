/**
 * Routes Module
 * API route handlers
 */

pub mod auth;
pub mod events;
pub mod form;
pub mod health;
pub mod newsletter;
pub mod portfolio;
pub mod settings;
pub mod users;

pub use crate::error::ErrorResponse;
