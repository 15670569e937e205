//! Request / response bodies of the public HTTP API.

pub mod chat;
pub mod health;
pub mod images;
pub mod upload;
