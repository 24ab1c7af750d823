//! External entity and resource resolution.
//!
//! [`EntityResolver`] maps the identifiers a document uses to refer to
//! external resources — system identifiers, public identifiers, bare file
//! names — onto concrete [`Location`]s, and opens byte sources for them.
//!
//! Beyond exact-match lookup the resolver infers *siblings*: once
//! `http://example.com/schemas/root.xsd` has been resolved to
//! `/local/schemas/root.xsd`, an unseen reference to
//! `http://example.com/schemas/child.xsd` resolves to
//! `/local/schemas/child.xsd` without being registered, because the
//! parent directory of every resolved location is remembered in a base
//! index. Successful inferences are written back into the index so later
//! lookups are O(1).
//!
//! Resolution never fails loudly: every miss is `None`, and the caller
//! decides whether to fall back to default handling or report the
//! resource as missing.
//!
//! The maps are owned by the instance and unsynchronized; concurrent use
//! requires independent instances or an external lock.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::WeaveError;
use crate::location::{is_absolute_reference, Location};

/// Resource type URI for XML 1.0 entities (DTDs).
pub const XML_RESOURCES: &str = "http://www.w3.org/TR/REC-xml";

/// Resource type URI for XML Schema resources.
pub const SCHEMA_RESOURCES: &str = "http://www.w3.org/2001/XMLSchema";

/// The well-known identifiers of the W3C `xml.xsd` schema.
const XML_XSD_IDS: [&str; 5] = [
    "http://www.w3.org/2001/xml.xsd",
    "http://www.w3.org/2009/01/xml.xsd",
    "http://www.w3.org/2007/08/xml.xsd",
    "http://www.w3.org/2004/10/xml.xsd",
    "http://www.w3.org/2001/03/xml.xsd",
];

/// What kind of external resource a validation pass is fetching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// An XML 1.0 entity (DTD or general entity).
    Entity,
    /// An XML Schema document.
    Schema,
}

impl ResourceKind {
    /// The resource type URI used by validation frameworks for this kind.
    pub fn type_uri(self) -> &'static str {
        match self {
            ResourceKind::Entity => XML_RESOURCES,
            ResourceKind::Schema => SCHEMA_RESOURCES,
        }
    }
}

/// An opened byte source for a resolved resource.
///
/// The bytes are buffered; every [`reader`](ResolvedSource::reader) call
/// starts from the beginning, so a source handed to a second consumer
/// never exposes already-consumed bytes.
#[derive(Clone, Debug)]
pub struct ResolvedSource {
    /// The concrete location the identifier resolved to.
    pub location: Location,
    /// Public identifier the source was requested under, if any.
    pub public_id: Option<String>,
    /// System identifier the source was requested under, if any.
    pub system_id: Option<String>,
    /// Base URI of the requesting document, for validation fetches.
    pub base_uri: Option<String>,
    bytes: Arc<[u8]>,
}

impl ResolvedSource {
    /// The buffered contents of the resource.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A reader over the contents, positioned at the start.
    pub fn reader(&self) -> Cursor<Arc<[u8]>> {
        Cursor::new(Arc::clone(&self.bytes))
    }
}

/// Cached bytes for one system identifier.
#[derive(Clone, Debug)]
struct CachedSource {
    location: Location,
    public_id: Option<String>,
    system_id: Option<String>,
    bytes: Arc<[u8]>,
}

/// Stateful resolver for external entities, schemas and inclusion targets.
///
/// # Example
///
/// ```no_run
/// use xmlweave::{EntityResolver, Location};
///
/// let mut resolver = EntityResolver::new();
/// resolver.add_system_id(
///     "http://example.com/schemas/root.xsd",
///     Location::from_path("/local/schemas/root.xsd"),
/// );
///
/// // root.xsd itself is an exact hit; child.xsd is found as a sibling.
/// let child = resolver.resolve_system_id(
///     Some("http://example.com/schemas/root.xsd"),
///     "child.xsd",
/// );
/// # let _ = child;
/// ```
#[derive(Debug, Default)]
pub struct EntityResolver {
    /// public identifier -> location
    public_ids: HashMap<String, Location>,
    /// system identifier -> location
    system_ids: HashMap<String, Location>,
    /// bare file name -> location
    bare_names: HashMap<String, Location>,
    /// parent-directory string -> one location resolved under it
    base_index: HashMap<String, Location>,
    default_base: Option<Location>,
    cache_sources: bool,
    cache: HashMap<String, CachedSource>,
}

impl EntityResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver whose default base directory is the parent of
    /// the given document location.
    pub fn with_base_document(document: &Location) -> Self {
        Self {
            default_base: document.parent(),
            ..Self::default()
        }
    }

    /// Set the default base directory used as a last resort when a
    /// reference has no base URI.
    pub fn set_default_base_location(&mut self, base: Location) {
        self.default_base = Some(base);
    }

    /// Enable or disable caching of opened sources. Off by default.
    pub fn set_cache_sources(&mut self, cache: bool) {
        self.cache_sources = cache;
        if !cache {
            self.cache.clear();
        }
    }

    /// Whether sources are cached.
    pub fn is_caching_sources(&self) -> bool {
        self.cache_sources
    }

    /// Drop all cached sources. Index registrations are kept.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Register a resolution for a public identifier.
    ///
    /// Also indexes the location's bare file name, so the resource can be
    /// found by name alone, and its parent directory for sibling lookups.
    pub fn add_public_id(&mut self, public_id: impl Into<String>, location: Location) {
        self.index_parent(&location);
        if let Some(name) = location.file_name() {
            self.bare_names.insert(name, location.clone());
        }
        self.public_ids.insert(public_id.into(), location);
    }

    /// Register a resolution for a system identifier.
    pub fn add_system_id(&mut self, system_id: impl Into<String>, location: Location) {
        self.index_parent(&location);
        self.system_ids.insert(system_id.into(), location);
    }

    /// Register one location under several system identifiers.
    pub fn add_system_ids<I, S>(&mut self, system_ids: I, location: Location)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for system_id in system_ids {
            self.add_system_id(system_id, location.clone());
        }
    }

    /// Register the well-known W3C identifiers for `xml.xsd` and the
    /// XML Schema namespace against local copies.
    ///
    /// Fails immediately when a copy is not actually readable, rather
    /// than deferring the miss to the first resolution.
    pub fn add_default_entities(
        &mut self,
        xml_xsd: Location,
        xml_schema_xsd: Location,
    ) -> Result<(), WeaveError> {
        for copy in [&xml_xsd, &xml_schema_xsd] {
            if !copy.exists() {
                return Err(WeaveError::Configuration(format!(
                    "default entity copy '{}' does not exist",
                    copy
                )));
            }
        }
        self.add_public_id(XML_RESOURCES, xml_xsd.clone());
        for id in XML_XSD_IDS {
            self.add_public_id(id, xml_xsd.clone());
        }
        self.add_public_id(SCHEMA_RESOURCES, xml_schema_xsd);
        Ok(())
    }

    /// The registered public-identifier resolutions.
    pub fn resolved_entities(&self) -> &HashMap<String, Location> {
        &self.public_ids
    }

    /// Whether the resolver can resolve the given system identifier,
    /// either directly or through an HTTP-scheme public registration.
    pub fn is_resolving_system_id(&self, system_id: &str) -> bool {
        self.system_ids.contains_key(system_id)
            || (is_http_scheme(system_id) && self.public_ids.contains_key(system_id))
    }

    /// Whether any system identifiers are registered.
    pub fn is_resolving_system_entities(&self) -> bool {
        !self.system_ids.is_empty()
    }

    /// Whether any public identifiers are registered.
    pub fn is_resolving_entities(&self) -> bool {
        !self.public_ids.is_empty()
    }

    /// Resolve a system identifier to a byte source.
    ///
    /// Consults, in order: the exact system-id index; the public-id index
    /// for HTTP-scheme identifiers; without a base URI, the bare-name
    /// index, then the sibling heuristic over every known parent
    /// directory, then the default base directory; with a base URI, the
    /// reference is resolved against the base's *physical* parent (the
    /// base index rewrites bases that were themselves remapped).
    ///
    /// A successful inference is registered so the next lookup is O(1).
    /// Returns `None` when nothing matched; the caller falls back to its
    /// default behavior.
    pub fn resolve_system_id(
        &mut self,
        base_uri: Option<&str>,
        system_id: &str,
    ) -> Option<ResolvedSource> {
        if let Some(location) = self.system_ids.get(system_id).cloned() {
            return self.open_source(&location, None, Some(system_id));
        }
        if is_http_scheme(system_id) && self.public_ids.contains_key(system_id) {
            return self.resolve_public_id(system_id);
        }
        match base_uri {
            None => self.resolve_without_base(system_id),
            Some(base) => self.resolve_against_base(base, system_id),
        }
    }

    /// Resolve a public identifier to a byte source.
    pub fn resolve_public_id(&mut self, public_id: &str) -> Option<ResolvedSource> {
        let location = self.public_ids.get(public_id).cloned()?;
        self.open_source(&location, Some(public_id), None)
    }

    /// Resolve an external resource requested by a validation pass.
    ///
    /// Returns `None` to let the caller fall back to its default
    /// network/file resolution. A reference found through the base-index
    /// rewrite is registered under its logical absolute URI, so the rest
    /// of a remapped schema tree resolves without further inference.
    pub fn resolve_resource(
        &mut self,
        kind: ResourceKind,
        namespace_uri: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
        base_uri: Option<&str>,
    ) -> Option<ResolvedSource> {
        log::debug!(
            "resolve_resource kind={} namespace={:?} publicId={:?} systemId={:?} baseURI={:?}",
            kind.type_uri(),
            namespace_uri,
            public_id,
            system_id,
            base_uri
        );
        match (system_id, base_uri) {
            (Some(system_id), _) => {
                if self.is_resolving_system_id(system_id) {
                    let location = self
                        .system_ids
                        .get(system_id)
                        .or_else(|| self.public_ids.get(system_id))
                        .cloned()?;
                    let mut source = self.open_source(&location, public_id, Some(system_id))?;
                    source.base_uri = base_uri.map(str::to_string);
                    return Some(source);
                }
                let base = base_uri?;
                let mut source = self.resolve_under_base(base, system_id)?;
                source.public_id = public_id.map(str::to_string);
                source.base_uri = Some(base.to_string());
                Some(source)
            }
            (None, Some(base_uri)) => {
                let location = Location::parse(base_uri)?;
                if !location.exists() {
                    return None;
                }
                self.open_source(&location, public_id, None)
            }
            (None, None) => None,
        }
    }

    /// Bare-name lookup, sibling scan, then default-base retry.
    fn resolve_without_base(&mut self, system_id: &str) -> Option<ResolvedSource> {
        if let Some(location) = self.bare_names.get(system_id).cloned() {
            return self.open_source(&location, None, Some(system_id));
        }
        let mut parents: Vec<Location> = self
            .base_index
            .keys()
            .filter_map(|parent| Location::parse(parent))
            .collect();
        if let Some(default_base) = &self.default_base {
            parents.push(default_base.clone());
        }
        for parent in parents {
            let Some(candidate) = parent.child(system_id) else {
                continue;
            };
            if candidate.exists() {
                self.memoize(system_id, &candidate);
                return self.open_source(&candidate, None, Some(system_id));
            }
        }
        log::debug!("no sibling of any resolved location matches '{}'", system_id);
        None
    }

    /// Resolution of a (possibly relative) reference against a base URI.
    fn resolve_against_base(&mut self, base_uri: &str, system_id: &str) -> Option<ResolvedSource> {
        let target = if is_absolute_reference(system_id) {
            Location::parse(system_id)?
        } else {
            let base = self
                .physical_base(base_uri)
                .or_else(|| Location::parse(base_uri))?;
            base.parent()?.child(system_id)?
        };
        if !target.exists() {
            log::debug!("'{}' relative to '{}' does not exist", system_id, base_uri);
            return None;
        }
        if !is_absolute_reference(system_id) {
            let logical = format!("{}{}", base_directory_of(base_uri), system_id);
            self.add_system_id(logical, target.clone());
        }
        self.open_source(&target, None, Some(system_id))
    }

    /// Sibling inference for a validation fetch: the base URI must itself
    /// be resolved; the reference joins the base's physical parent.
    fn resolve_under_base(&mut self, base_uri: &str, system_id: &str) -> Option<ResolvedSource> {
        if !self.is_resolving_system_id(base_uri) {
            return None;
        }
        let base = self.physical_base(base_uri)?;
        let target = base.parent()?.child(system_id)?;
        let logical = format!("{}{}", base_directory_of(base_uri), system_id);
        self.add_system_id(logical, target.clone());
        self.open_source(&target, None, Some(system_id))
    }

    /// The physical location a base URI stands for.
    ///
    /// Exact registrations win; otherwise, when a sibling of the base was
    /// resolved before, the base is rewritten under that sibling's
    /// physical parent directory.
    fn physical_base(&self, base_uri: &str) -> Option<Location> {
        if let Some(location) = self.system_ids.get(base_uri) {
            return Some(location.clone());
        }
        if let Some(location) = self.public_ids.get(base_uri) {
            return Some(location.clone());
        }
        let base = Location::parse(base_uri)?;
        let logical_parent = base.parent()?;
        let anchor = self.base_index.get(&logical_parent.to_string())?;
        let physical_parent = anchor.parent()?;
        physical_parent.child(&base.file_name()?)
    }

    /// Record an inferred resolution so later lookups are exact hits.
    fn memoize(&mut self, system_id: &str, location: &Location) {
        self.add_system_id(system_id.to_string(), location.clone());
    }

    fn index_parent(&mut self, location: &Location) {
        if let Some(parent) = location.parent() {
            self.base_index.insert(parent.to_string(), location.clone());
        }
    }

    /// Open a byte source for a location, through the cache if enabled.
    fn open_source(
        &mut self,
        location: &Location,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Option<ResolvedSource> {
        let key = system_id.or(public_id)?.to_string();
        if self.cache_sources {
            if let Some(cached) = self.cache.get(&key) {
                return Some(ResolvedSource {
                    location: cached.location.clone(),
                    public_id: cached.public_id.clone(),
                    system_id: cached.system_id.clone(),
                    base_uri: None,
                    bytes: Arc::clone(&cached.bytes),
                });
            }
        }
        let bytes: Arc<[u8]> = match location.read_bytes() {
            Ok(bytes) => bytes.into(),
            Err(err) => {
                log::debug!("failed to open '{}': {}", location, err);
                return None;
            }
        };
        if self.cache_sources {
            self.cache.insert(
                key,
                CachedSource {
                    location: location.clone(),
                    public_id: public_id.map(str::to_string),
                    system_id: system_id.map(str::to_string),
                    bytes: Arc::clone(&bytes),
                },
            );
        }
        Some(ResolvedSource {
            location: location.clone(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            base_uri: None,
            bytes,
        })
    }
}

fn is_http_scheme(reference: &str) -> bool {
    reference.starts_with("http:") || reference.starts_with("https:")
}

/// The directory part of a URI string, with a trailing slash.
fn base_directory_of(base_uri: &str) -> String {
    match base_uri.rfind('/') {
        Some(at) => base_uri[..=at].to_string(),
        None => format!("{}/", base_uri),
    }
}
