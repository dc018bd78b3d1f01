//! # Gazette Chat
//!
//! Chat with historical newspapers. Pick a document from a catalog and
//! exchange messages with an assistant that has the document as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  select   ┌──────────────┐  send   ┌──────────────┐
//! │ DocumentCat. │─────────▶ │ ChatSession  │───────▶ │  Response    │
//! │ static/remote│  enrich   │ state machine│ ◀────── │  Resolver    │
//! └──────────────┘           └──────┬───────┘  reply  └──────────────┘
//!                                   │ snapshots
//!                          ┌────────┴────────┐
//!                          ▼                 ▼
//!                     ┌─────────┐      ┌──────────┐
//!                     │  CLI    │      │ renderer │
//!                     │(gazette)│      │ composer │
//!                     └─────────┘      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment override |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Documents, sections, messages |
//! | [`dates`] | Ordinal display dates |
//! | [`archive`] | Built-in newspaper archive |
//! | [`catalog`] | Tolerant ingestion, static and remote sources |
//! | [`selector`] | Dropdown state machine and view |
//! | [`resolver`] | Remote and local reply resolvers |
//! | [`session`] | Chat session state machine |
//! | [`composer`] | Draft and submission gating |
//! | [`render`] | Transcript rendering |
//! | [`controller`] | Session owner driven by message passing |
//! | [`mock_server`] | Local HTTP backend |

pub mod archive;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod controller;
pub mod dates;
pub mod error;
pub mod mock_server;
pub mod models;
pub mod render;
pub mod resolver;
pub mod selector;
pub mod session;
