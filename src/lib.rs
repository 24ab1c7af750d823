//! xmlweave -- Streaming XInclude expansion and external resource resolution
//!
//! Reconstructs a single XML document from a root document and its
//! XInclude fragments, preserving the whitespace, comments and encoding
//! of the sources, and resolves DTD/Schema/entity references through a
//! stateful resource index with sibling inference.
//!
//! # Overview
//!
//! - [`XmlIncluder`] expands `xi:include` directives textually, driven by
//!   `quick-xml` streaming events.
//! - [`EntityResolver`] maps public/system identifiers to concrete
//!   locations, inferring never-registered siblings from resolutions it
//!   has already seen.
//! - [`Location`] carries the small slice of URI algebra both need:
//!   parent directories, child joins, bare file names.
//!
//! Resolution misses are never panics or errors: the resolver answers
//! `None` and inclusion failures degrade to warnings on the diagnostics
//! channel, leaving the surrounding document intact.
//!
//! # Example
//!
//! ```no_run
//! use xmlweave::XmlIncluder;
//!
//! let mut includer = XmlIncluder::from_path("doc/root.xml");
//! includer.set_add_comments(true, false);
//! let expanded = includer.content()?;
//! # let _ = expanded;
//! # Ok::<(), xmlweave::WeaveError>(())
//! ```

#![warn(missing_docs)]
#![deny(clippy::large_enum_variant, clippy::redundant_clone)]
#![warn(
    clippy::box_collection,
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod includer;
pub mod location;
pub mod reader;
pub mod resolver;

// Re-export key types for convenience
pub use diagnostics::{CollectingHandler, Diagnostic, ErrorHandler, Severity, Signal};
pub use error::WeaveError;
pub use includer::{IncludeOptions, XmlIncluder, XINCLUDE_NS};
pub use location::Location;
pub use reader::{decode_bytes, read_location_to_string};
pub use resolver::{EntityResolver, ResolvedSource, ResourceKind};
