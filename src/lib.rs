//! # RenderScreenshot
//!
//! Rust client for the RenderScreenshot API: capture screenshots and PDFs of
//! web pages, generate signed URLs for browser-side use, manage the render
//! cache and verify webhook deliveries.
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Error classifier | [`error`] | Maps HTTP outcomes to typed [`ApiError`]s |
//! | Resilient transport | [`transport`], [`retry`] | Authenticated calls with backoff |
//! | Request signer | [`signing`] | HMAC-SHA256 signed screenshot URLs |
//! | Webhook verifier | [`webhook`] | Signature and replay-window checks |
//!
//! ## Retries
//!
//! Retries are opt-in (`max_retries = 0` by default). Only transient errors
//! are retried: rate limiting, timeouts, render and internal failures,
//! connection errors and any 5xx. A server `Retry-After` always wins over
//! the computed backoff, which is `retry_delay * 2^attempt` plus jitter and
//! capped at 30 seconds.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use renderscreenshot::{Client, ClientConfig, ImageFormat, TakeOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         max_retries: 3,
//!         retry_delay: Duration::from_millis(500),
//!         ..Default::default()
//!     };
//!     let client = Client::new("rs_live_xxx", config)?;
//!
//!     let options = TakeOptions::url("https://example.com")
//!         .width(1200)
//!         .height(630)
//!         .format(ImageFormat::Png);
//!     let image = client.take(&options).await?;
//!     println!("Screenshot captured: {} bytes", image.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Verifying Webhooks
//!
//! ```rust
//! use renderscreenshot::{extract_webhook_headers, parse_webhook, verify_webhook};
//!
//! fn handle(body: &str, headers: &[(&str, &str)], secret: &str) -> bool {
//!     let h = extract_webhook_headers(headers.iter().copied());
//!     if !verify_webhook(body, &h.signature, &h.timestamp, secret, None) {
//!         return false;
//!     }
//!     parse_webhook(body).is_ok()
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! renderscreenshot take --url https://example.com --output example.png
//! renderscreenshot sign-url --url https://example.com --expires-in 3600
//! renderscreenshot verify-webhook --payload body.json --signature sha256=... --timestamp 1700000000
//! ```

/// Client configuration and defaults
pub mod config;

/// Typed API errors and HTTP outcome classification
pub mod error;

/// Retry policy and backoff schedule
pub mod retry;

/// Authenticated HTTP transport with retries
pub mod transport;

/// HMAC-SHA256 signed URLs
pub mod signing;

/// Webhook signature verification and parsing
pub mod webhook;

/// Screenshot request options
pub mod options;

/// API response types
pub mod types;

/// Cache management operations
pub mod cache;

/// High-level API client
pub mod client;

/// Command-line interface implementation
pub mod cli;

/// Transport metrics instruments
pub mod metrics;

/// Output helpers for the command-line interface
pub mod utils;


pub use cache::*;
pub use cli::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use options::*;
pub use retry::*;
pub use signing::*;
pub use transport::*;
pub use types::*;
pub use utils::*;
pub use webhook::*;

pub use crate::metrics::TransportMetrics;

/// Crate version, also sent in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
