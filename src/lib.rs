//! iYKELib - digital library backend
//!
//! REST API over a catalog of books and video tutorials with accounts,
//! ratings, bookmarks, threaded comments, reading history, courses with
//! certificates, and download/view analytics for the admin panel.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
