//! # parcel-sources
//!
//! Lecture paginée des parcelles cadastrales portugaises depuis les deux APIs publiques.
//!
//! ## Features
//!
//! - INSPIRE (DGT, WFS 2.0, EPSG:3763), pages de 50 000 enregistrements
//! - RGG (BUPi, ArcGIS MapServer, EPSG:4326), pages de 2 000 enregistrements
//! - Retry avec backoff exponentiel par page
//! - Séquence paresseuse de pages (`Stream`): mémoire bornée à quelques pages
//! - Transport injectable via le trait [`PageFetcher`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use futures::TryStreamExt;
//! use parcel_sources::{Endpoint, HttpPageFetcher, RetryPolicy, Source, SourceReader};
//!
//! let fetcher = Arc::new(HttpPageFetcher::with_default_client()?);
//! let reader = SourceReader::new(fetcher, Endpoint::for_source(Source::Rgg), RetryPolicy::default());
//!
//! let mut pages = Box::pin(reader.pages());
//! while let Some(page) = pages.try_next().await? {
//!     println!("offset {}: {} features", page.cursor.offset, page.len());
//! }
//! ```

pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod reader;
pub mod retry;
pub mod types;

pub use endpoint::Endpoint;
pub use error::{SourceError, TransportError};
pub use fetch::{HttpPageFetcher, PageFetcher};
pub use reader::SourceReader;
pub use retry::RetryPolicy;
pub use types::{Cursor, Page, RawFeature, Source};
