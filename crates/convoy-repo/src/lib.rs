//! Convoy Registry Access
//!
//! Charts that are declared by name and version only are downloaded from the
//! registry root as `<registry>/<name>-<version>.tgz` into the local charts
//! directory.
//!
//! ```rust,no_run
//! use convoy_repo::{ChartFetcher, HttpChartFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpChartFetcher::new("https://charts.example.com", "charts")?;
//! let archive = fetcher.fetch("web", "1.2.0").await?;
//! println!("{}", archive.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetch;

pub use error::{RepoError, Result};
pub use fetch::{ChartFetcher, HttpChartFetcher, RetryPolicy};
