// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Bidirectional, lazily fetched iteration over limit/offset page sources.
//!
//! [`PageCursor`] keeps a sparse window of fetched elements around the
//! current position and decides, on every `advance`/`retreat`, whether the
//! cache suffices or a fetch must go out through the injected [`PageSource`]
//! capability. Fetches are serialized per direction and coalesced; a short
//! page marks the source exhausted.
//!
//! The crate exposes:
//! - [`PageCursor`]: the windowed cursor engine (`reset`, `advance`, `retreat`).
//! - [`PageSource`]: the fetch capability implemented by consumers.
//! - [`CursorConfig`]: watermark configuration.
//! - [`CursorMetrics`]: operation counters.

pub mod config;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod source;

pub use config::CursorConfig;
pub use cursor::PageCursor;
pub use error::{BoxError, FetchError, FetchResult};
pub use metrics::{CursorMetrics, CursorMetricsSnapshot};
pub use source::{PageSource, UnimplementedSource};
