//! # Techlynx Site
//!
//! The Techlynx Pro agency website: public marketing pages rendered from an
//! editable SQLite content store, lead capture with best-effort IP
//! geolocation, and a chatbot that answers from a text digest of the site.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  seed.toml  │──▶│ Content     │──▶│  SQLite   │
//! │  admin API  │   │ store       │   │ blocks +  │
//! └─────────────┘   └─────────────┘   │ items     │
//!                                     └────┬─────┘
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │  Pages   │       │ Chatbot  │
//!                 │ + leads  │       │ context  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! techlynx init                 # create database
//! techlynx seed                 # load fixtures/seed.toml
//! techlynx context stats        # inspect the chatbot context
//! techlynx serve                # start the site
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Content and lead data types |
//! | [`store`] | Content store queries |
//! | [`slug`] | Slug generation |
//! | [`render`] | Template rendering |
//! | [`pages`] | Public page handlers |
//! | [`leads`] | Contact, newsletter, and career forms |
//! | [`geo`] | IP geolocation fallback chain |
//! | [`context`] | Chatbot context extraction and cache |
//! | [`chat`] | Chat API |
//! | [`llm`] | Language model client |
//! | [`ratelimit`] | Sliding-window rate limiter |
//! | [`session`] | Signed-cookie visitor sessions |
//! | [`admin`] | Schema-driven admin surface |
//! | [`seed`] | Declarative fixtures |
//! | [`sitemap`] | `sitemap.xml` and `robots.txt` |
//! | [`server`] | HTTP server |
//! | [`error`] | HTTP-facing errors |

pub mod admin;
pub mod chat;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod geo;
pub mod leads;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pages;
pub mod ratelimit;
pub mod render;
pub mod seed;
pub mod server;
pub mod session;
pub mod sitemap;
pub mod slug;
pub mod store;
