//! Resource locations and the parent/child algebra used to resolve them.
//!
//! A [`Location`] names a concrete place bytes can come from: a filesystem
//! path or a remote URL. The resolver and includer only ever need a small
//! subset of URI algebra — parent directory, child join with `.`/`..`
//! normalization, bare file name — and that subset lives here.
//!
//! Remote locations are inert: they can be indexed, compared and joined,
//! but opening one returns an error until it has been remapped to a local
//! file. Fetching over the network is out of scope.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use url::Url;

/// A resolved or resolvable resource location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// A local filesystem path.
    File(PathBuf),
    /// A remote URL (`http`/`https` or any other non-file scheme).
    Remote(Url),
}

impl Location {
    /// Create a location from a filesystem path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Location::File(path.as_ref().to_path_buf())
    }

    /// Parse a location from a URI reference or a plain path.
    ///
    /// Absolute references with a scheme become [`Location::Remote`]
    /// (or [`Location::File`] for `file:` URLs); anything else is taken
    /// as a filesystem path.
    pub fn parse(input: &str) -> Option<Self> {
        if is_absolute_reference(input) {
            let url = Url::parse(input).ok()?;
            if url.scheme() == "file" {
                return url.to_file_path().ok().map(Location::File);
            }
            return Some(Location::Remote(url));
        }
        if input.is_empty() {
            return None;
        }
        Some(Location::File(PathBuf::from(input)))
    }

    /// The parent directory of this location, if it has one.
    pub fn parent(&self) -> Option<Location> {
        match self {
            Location::File(path) => {
                let parent = path.parent()?;
                if parent.as_os_str().is_empty() {
                    return None;
                }
                Some(Location::File(parent.to_path_buf()))
            }
            Location::Remote(url) => {
                let mut parent = url.clone();
                {
                    let mut segments = parent.path_segments_mut().ok()?;
                    segments.pop_if_empty().pop();
                }
                if parent.path() == url.path() {
                    return None;
                }
                Some(Location::Remote(parent))
            }
        }
    }

    /// Resolve a relative reference against this location, treating it
    /// as a directory.
    ///
    /// `.` and `..` segments are collapsed. An already-absolute
    /// reference resolves to itself.
    pub fn child(&self, relative: &str) -> Option<Location> {
        if is_absolute_reference(relative) {
            return Location::parse(relative);
        }
        match self {
            Location::File(dir) => {
                let joined = format!("{}/{}", dir.to_string_lossy(), relative);
                Some(Location::File(normalize_path(&joined)))
            }
            Location::Remote(url) => {
                // Url::join resolves siblings unless the base ends in '/'.
                let mut base = url.clone();
                if !base.path().ends_with('/') {
                    base.set_path(&format!("{}/", base.path()));
                }
                base.join(relative).ok().map(Location::Remote)
            }
        }
    }

    /// The final path segment (file name with extension), if any.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            Location::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether bytes can actually be read from this location.
    ///
    /// Remote locations always report `false`; they are only readable
    /// once remapped to a local file.
    pub fn exists(&self) -> bool {
        match self {
            Location::File(path) => path.exists(),
            Location::Remote(_) => false,
        }
    }

    /// Whether this location names a directory on the backing store.
    pub fn is_directory(&self) -> bool {
        match self {
            Location::File(path) => path.is_dir(),
            Location::Remote(_) => false,
        }
    }

    /// Open the location as a byte stream.
    pub fn open(&self) -> io::Result<File> {
        match self {
            Location::File(path) => File::open(path),
            Location::Remote(url) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("remote location '{}' is not fetchable", url),
            )),
        }
    }

    /// Read the full contents of the location.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        let mut file = self.open()?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// The underlying filesystem path, for file-backed locations.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::File(path) => Some(path),
            Location::Remote(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Whether a reference carries a scheme and is therefore absolute.
pub fn is_absolute_reference(reference: &str) -> bool {
    match reference.split_once(':') {
        Some((scheme, rest)) => {
            // A one-letter scheme is more likely a Windows drive.
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
                && (rest.starts_with("//") || scheme.eq_ignore_ascii_case("file"))
        }
        None => false,
    }
}

/// Collapse `.` and `..` segments in a slash-separated path.
fn normalize_path(path: &str) -> PathBuf {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    let mut joined = parts.join("/");
    if absolute {
        joined.insert(0, '/');
    }
    PathBuf::from(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote() {
        let loc = Location::parse("http://example.com/schemas/root.xsd").unwrap();
        assert!(matches!(loc, Location::Remote(_)));
        assert_eq!(loc.file_name().as_deref(), Some("root.xsd"));
    }

    #[test]
    fn test_parse_plain_path() {
        let loc = Location::parse("schemas/root.xsd").unwrap();
        assert_eq!(loc, Location::File(PathBuf::from("schemas/root.xsd")));
    }

    #[test]
    fn test_parent_of_remote() {
        let loc = Location::parse("http://example.com/a/b/c.xsd").unwrap();
        let parent = loc.parent().unwrap();
        assert_eq!(parent.to_string(), "http://example.com/a/b");
    }

    #[test]
    fn test_parent_of_file() {
        let loc = Location::from_path("/data/schemas/root.xsd");
        let parent = loc.parent().unwrap();
        assert_eq!(parent, Location::File(PathBuf::from("/data/schemas")));
    }

    #[test]
    fn test_child_join_normalizes_dots() {
        let dir = Location::from_path("/data/schemas");
        let child = dir.child("../common/types.xsd").unwrap();
        assert_eq!(child, Location::File(PathBuf::from("/data/common/types.xsd")));
    }

    #[test]
    fn test_child_of_remote_directory() {
        let dir = Location::parse("http://example.com/schemas").unwrap();
        let child = dir.child("child.xsd").unwrap();
        assert_eq!(child.to_string(), "http://example.com/schemas/child.xsd");
    }

    #[test]
    fn test_child_absolute_reference_wins() {
        let dir = Location::from_path("/data");
        let child = dir.child("http://example.com/x.xsd").unwrap();
        assert!(matches!(child, Location::Remote(_)));
    }

    #[test]
    fn test_absolute_reference_detection() {
        assert!(is_absolute_reference("http://example.com/x"));
        assert!(is_absolute_reference("https://example.com/x"));
        assert!(is_absolute_reference("file:///tmp/x"));
        assert!(!is_absolute_reference("child.xsd"));
        assert!(!is_absolute_reference("dir/child.xsd"));
        assert!(!is_absolute_reference("C:\\data\\child.xsd"));
    }

    #[test]
    fn test_remote_never_exists() {
        let loc = Location::parse("http://example.com/x.xsd").unwrap();
        assert!(!loc.exists());
        assert!(loc.open().is_err());
    }
}
