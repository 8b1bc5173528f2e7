//! Messaging and conversation subsystem for the TalentLink marketplace.
//!
//! Two-party threads between talent and companies (plus admin-initiated
//! ones), message lifecycle with delivery and read tracking, ephemeral
//! typing presence, an attachment pipeline over private object storage, and
//! an admin oversight surface with bulk messaging.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod typing;
pub mod websocket;
