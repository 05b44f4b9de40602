//! # Shop Telegram Bot
//!
//! A Telegram storefront: buyers browse and order through a web app backed by
//! a small JSON API, operators run the shop from an in-chat admin panel with
//! multi-step forms. Everything is persisted in a single SQLite file.

pub mod api;
pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod localization;
pub mod models;
pub mod notifier;
