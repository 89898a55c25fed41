//! Corpsite - corporate website with a content-management backend
//!
//! This library provides the site's REST API, the server-rendered pages, the
//! account system and the live update relay.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod relay;
pub mod services;
pub mod theme;
