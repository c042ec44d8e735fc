//! Domain services used by HTTP and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and persistence so route handlers can
//! stay focused on protocol translation, auth plumbing and publishing
//! realtime changes.

pub mod auth;
pub mod cascade;
pub mod check_in;
pub mod error;
pub mod home;
pub mod issue;
pub mod notification;
pub mod photo;
pub mod portal;
pub mod profile;
pub mod project;
pub mod realtime;
pub mod session;
pub mod stats;
pub mod storage;
pub mod task;
