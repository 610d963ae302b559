//! Driver acquisition pipeline for Wheelman.
//!
//! [`DriverResolver`] is the entry point: it checks the canonical driver
//! locations first and only probes, downloads, and extracts on a cache
//! miss. Version detection and download each run an ordered fallback chain
//! (see [`chain`]); the resolver is the sole caller of the other
//! components, which never call each other.

pub mod chain;
pub mod extract;
pub mod probe;
pub mod resolver;
pub mod transport;

pub use extract::{Extractor, ShellExtractor, ZipExtractor, default_extractor};
pub use probe::{EdgeVersionProbe, VersionProbe};
pub use resolver::DriverResolver;
pub use transport::{HttpTransport, Transport};
