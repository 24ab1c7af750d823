//! Textual XInclude expansion.
//!
//! [`XmlIncluder`] reconstructs a single document from a root document and
//! the fragments referenced by its `include` directives, writing text
//! rather than a node tree so that the whitespace, comments and attribute
//! order of the sources survive. The expansion is driven by
//! `quick_xml::Reader` events; included documents are expanded
//! recursively into the same output buffer.
//!
//! Inclusion directives are elements named `include` under the prefix
//! bound to the XInclude namespace, with an `href` attribute and an
//! optional `parse` attribute (`"xml"` default, or `"text"` for raw line
//! copying). A directive whose target is missing, a directory or
//! malformed degrades to a warning and an empty splice; the rest of the
//! document is unaffected.
//!
//! The output mirrors the input: an element only gets an explicit close
//! tag when it had children or character data, otherwise it collapses to
//! `/>`. A stack of [`OutputNode`]s tracks the unclosed tags of the
//! *output* text, which can interleave several input documents.

use std::io::Write;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::diagnostics::{Diagnostic, ErrorHandler, Severity, Signal};
use crate::error::WeaveError;
use crate::location::{is_absolute_reference, Location};
use crate::reader::decode_bytes;
use crate::resolver::EntityResolver;

/// The XInclude namespace URI.
pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

/// Local name of the inclusion directive element.
const INCLUDE_ELEMENT: &str = "include";

/// Upper bound on nested inclusion depth.
const MAX_INCLUDE_DEPTH: usize = 50;

/// Options controlling an expansion.
#[derive(Clone, Copy, Debug)]
pub struct IncludeOptions {
    /// Emit a `<!-- Included file: … -->` marker before each inclusion.
    pub add_comments: bool,
    /// Emit markers inside nested inclusions as well.
    pub deep_comments: bool,
    /// Charset used when writing the expanded content out.
    pub charset: &'static Encoding,
    /// Abort the outer expansion when a nested document is unparseable.
    ///
    /// Off by default: a fatal error in an included document is reported
    /// through the error handler and aborts only that nested expansion;
    /// the outer document keeps writing past the splice point.
    pub propagate_nested_fatal: bool,
}

impl Default for IncludeOptions {
    fn default() -> Self {
        Self {
            add_comments: false,
            deep_comments: false,
            charset: UTF_8,
            propagate_nested_fatal: false,
        }
    }
}

/// An unclosed tag in the output text.
#[derive(Debug)]
struct OutputNode {
    qname: String,
    /// Whether the opening tag has been closed with `>`.
    is_started: bool,
    has_children: bool,
}

/// Why an expansion level terminated early.
enum Halt {
    /// A handler callback requested cooperative termination.
    Stop(Option<String>),
    /// The parser could not continue at this level.
    Fatal {
        message: String,
        line: Option<u64>,
    },
}

/// Where the root document comes from.
enum SourceInput {
    Location(Location),
    Bytes(Vec<u8>),
}

/// One document being expanded (root or included).
struct DocScope<'a> {
    text: &'a str,
    /// Location of the document itself, when it has one.
    uri: Option<String>,
    /// Directory the document's relative references resolve against.
    dir: Option<Location>,
    /// Indentation of the include site, prepended to every tag written
    /// for this document.
    parent_tab: &'a str,
    depth: usize,
    is_root: bool,
    add_comments: bool,
}

/// Streaming XInclude expander.
///
/// # Example
///
/// ```no_run
/// use xmlweave::XmlIncluder;
///
/// let mut includer = XmlIncluder::from_path("doc/root.xml");
/// includer.set_add_comments(true, false);
/// let expanded = includer.content()?;
/// # Ok::<(), xmlweave::WeaveError>(())
/// ```
pub struct XmlIncluder {
    source: SourceInput,
    default_base: Option<Location>,
    options: IncludeOptions,
    handler: Option<Box<dyn ErrorHandler>>,
    resolver: Option<EntityResolver>,
    collected: Vec<Diagnostic>,
    encoding_name: Option<String>,
    output: Option<String>,
    partial: Option<String>,
    stop_payload: Option<Option<String>>,
    has_fatal: bool,
}

impl XmlIncluder {
    /// Create an includer for a document at a location.
    pub fn from_location(location: Location) -> Self {
        Self::new(SourceInput::Location(location))
    }

    /// Create an includer for a document file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::from_location(Location::from_path(path))
    }

    /// Create an includer for an in-memory document.
    ///
    /// Relative inclusion targets then need a default base directory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(SourceInput::Bytes(bytes))
    }

    fn new(source: SourceInput) -> Self {
        Self {
            source,
            default_base: None,
            options: IncludeOptions::default(),
            handler: None,
            resolver: None,
            collected: Vec::new(),
            encoding_name: None,
            output: None,
            partial: None,
            stop_payload: None,
            has_fatal: false,
        }
    }

    /// Set the default base directory used to resolve relative targets
    /// when the including document has no location of its own.
    pub fn set_default_base_directory(&mut self, base: Location) {
        self.default_base = Some(base);
    }

    /// Enable marker comments; `deep` extends them to nested inclusions.
    pub fn set_add_comments(&mut self, add_comments: bool, deep: bool) {
        self.options.add_comments = add_comments;
        self.options.deep_comments = deep;
    }

    /// Whether marker comments are enabled.
    pub fn is_adding_comments(&self) -> bool {
        self.options.add_comments
    }

    /// Set the charset used by [`write_to`](Self::write_to).
    pub fn set_charset(&mut self, charset: &'static Encoding) {
        self.options.charset = charset;
    }

    /// The charset used when writing the content out.
    pub fn charset(&self) -> &'static Encoding {
        self.options.charset
    }

    /// Mutable access to all expansion options.
    pub fn options_mut(&mut self) -> &mut IncludeOptions {
        &mut self.options
    }

    /// Install the handler that receives warnings, errors and fatal
    /// errors raised during expansion.
    pub fn set_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.handler = Some(handler);
    }

    /// Attach a resolver consulted for `href` targets before the
    /// relative-path logic.
    pub fn set_resolver(&mut self, resolver: EntityResolver) {
        self.resolver = Some(resolver);
    }

    /// Detach and return the attached resolver.
    pub fn take_resolver(&mut self) -> Option<EntityResolver> {
        self.resolver.take()
    }

    /// Diagnostics collected so far, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.collected
    }

    /// Whether a fatal parse error occurred at any expansion level.
    pub fn has_fatal_error(&self) -> bool {
        self.has_fatal
    }

    /// Output accumulated before an aborted or stopped expansion.
    pub fn partial_output(&self) -> Option<&str> {
        self.partial.as_deref()
    }

    /// Payload of a cooperative stop, when a callback returned one.
    pub fn stop_payload(&self) -> Option<&str> {
        self.stop_payload.as_ref()?.as_deref()
    }

    /// Expand the document and return the reconstructed text.
    ///
    /// The result is computed once and cached. A fatal error in the root
    /// document or a cooperative stop returns `Err`; the text produced up
    /// to that point stays available through
    /// [`partial_output`](Self::partial_output), and every diagnostic
    /// through [`diagnostics`](Self::diagnostics).
    pub fn content(&mut self) -> Result<String, WeaveError> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        let (bytes, uri, dir) = self.load_root()?;
        self.encoding_name = crate::encoding::detect_encoding(&bytes);
        let text = decode_bytes(&bytes, None)?;

        let mut out = String::new();
        if let Some(encoding) = &self.encoding_name {
            out.push_str("<?xml version=\"1.0\" encoding=\"");
            out.push_str(encoding);
            out.push_str("\"?>\n");
        }
        let scope = DocScope {
            text: &text,
            uri,
            dir,
            parent_tab: "",
            depth: 0,
            is_root: true,
            add_comments: self.options.add_comments,
        };
        match self.expand_document(scope, &mut out) {
            Ok(()) => {
                self.output = Some(out.clone());
                Ok(out)
            }
            Err(Halt::Stop(payload)) => {
                self.partial = Some(out);
                self.stop_payload = Some(payload.clone());
                Err(WeaveError::Stopped { payload })
            }
            Err(Halt::Fatal { message, line }) => {
                self.partial = Some(out);
                Err(WeaveError::FatalParse { message, line })
            }
        }
    }

    /// Write the expanded content to a sink, encoded with the configured
    /// charset.
    pub fn write_to<W: Write>(&mut self, mut sink: W) -> Result<(), WeaveError> {
        let content = self.content()?;
        let (encoded, _, _) = self.options.charset.encode(&content);
        sink.write_all(&encoded)?;
        Ok(())
    }

    /// Write the expanded content to a file.
    pub fn write_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WeaveError> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)
    }

    /// Read the root source and work out its location context.
    fn load_root(&mut self) -> Result<(Vec<u8>, Option<String>, Option<Location>), WeaveError> {
        match &self.source {
            SourceInput::Location(location) => {
                let bytes = location
                    .read_bytes()
                    .map_err(|_| WeaveError::SourceNotFound(location.to_string()))?;
                Ok((bytes, Some(location.to_string()), location.parent()))
            }
            SourceInput::Bytes(bytes) => Ok((bytes.clone(), None, None)),
        }
    }

    /// Run the event loop for one document, root or included.
    fn expand_document(&mut self, scope: DocScope<'_>, out: &mut String) -> Result<(), Halt> {
        let mut reader = Reader::from_reader(scope.text.as_bytes());
        reader.config_mut().expand_empty_elements = true;

        let mut buf = Vec::new();
        let mut nodes: Vec<OutputNode> = Vec::new();
        let mut pending: Option<String> = None;
        let mut include_prefix: Option<String> = None;
        // Depth inside an inclusion directive whose events are dropped.
        let mut skipping: usize = 0;
        let mut root_closed = false;

        loop {
            let position = reader.buffer_position();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if skipping > 0 {
                        skipping += 1;
                        buf.clear();
                        continue;
                    }
                    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    remember_include_prefix(&e, &mut include_prefix);

                    if let Some(parent) = nodes.last_mut() {
                        parent.has_children = true;
                        if !parent.is_started {
                            out.push('>');
                            parent.is_started = true;
                        }
                    }
                    let tab = flush_pending(out, &mut pending).unwrap_or_default();

                    if is_include_directive(&qname, include_prefix.as_deref()) {
                        let line = line_at(scope.text, position);
                        self.process_include(&e, &scope, &tab, line, out)?;
                        skipping = 1;
                    } else {
                        out.push_str(scope.parent_tab);
                        out.push('<');
                        out.push_str(&qname);
                        write_attributes(&e, out);
                        nodes.push(OutputNode {
                            qname,
                            is_started: false,
                            has_children: false,
                        });
                    }
                }
                Ok(Event::End(_)) => {
                    if skipping > 0 {
                        skipping -= 1;
                        buf.clear();
                        continue;
                    }
                    let mut has_content = false;
                    if pending.is_some() {
                        if let Some(node) = nodes.last() {
                            if !node.is_started {
                                out.push('>');
                            }
                        }
                        flush_pending(out, &mut pending);
                        has_content = true;
                    }
                    if let Some(node) = nodes.pop() {
                        if has_content || node.has_children {
                            out.push_str(scope.parent_tab);
                            out.push_str("</");
                            out.push_str(&node.qname);
                            out.push('>');
                        } else {
                            out.push_str("/>");
                        }
                    }
                    if nodes.is_empty() {
                        root_closed = true;
                    }
                }
                Ok(Event::Empty(e)) => {
                    // Not emitted while expand_empty_elements is set.
                    if skipping > 0 {
                        buf.clear();
                        continue;
                    }
                    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    remember_include_prefix(&e, &mut include_prefix);
                    if let Some(parent) = nodes.last_mut() {
                        parent.has_children = true;
                        if !parent.is_started {
                            out.push('>');
                            parent.is_started = true;
                        }
                    }
                    let tab = flush_pending(out, &mut pending).unwrap_or_default();
                    if is_include_directive(&qname, include_prefix.as_deref()) {
                        let line = line_at(scope.text, position);
                        self.process_include(&e, &scope, &tab, line, out)?;
                    } else {
                        out.push_str(scope.parent_tab);
                        out.push('<');
                        out.push_str(&qname);
                        write_attributes(&e, out);
                        out.push_str("/>");
                    }
                }
                Ok(Event::Text(e)) => {
                    if skipping > 0 {
                        buf.clear();
                        continue;
                    }
                    let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                    if nodes.is_empty() {
                        // Whitespace around the root element: the prolog
                        // region is regenerated, the tail is kept verbatim
                        // for the root document only.
                        if root_closed && scope.is_root {
                            out.push_str(&raw);
                        }
                    } else {
                        pending.get_or_insert_with(String::new).push_str(&raw);
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if skipping > 0 {
                        buf.clear();
                        continue;
                    }
                    if !nodes.is_empty() {
                        let text = pending.get_or_insert_with(String::new);
                        text.push('&');
                        text.push_str(&String::from_utf8_lossy(e.as_ref()));
                        text.push(';');
                    }
                }
                Ok(Event::CData(e)) => {
                    if skipping > 0 {
                        buf.clear();
                        continue;
                    }
                    write_structural(&mut nodes, &mut pending, out, |out| {
                        out.push_str("<![CDATA[");
                        out.push_str(&String::from_utf8_lossy(e.as_ref()));
                        out.push_str("]]>");
                    });
                }
                Ok(Event::Comment(e)) => {
                    if skipping > 0 {
                        buf.clear();
                        continue;
                    }
                    if nodes.is_empty() {
                        out.push_str("<!--");
                        out.push_str(&String::from_utf8_lossy(e.as_ref()));
                        out.push_str("-->\n");
                    } else {
                        write_structural(&mut nodes, &mut pending, out, |out| {
                            out.push_str("<!--");
                            out.push_str(&String::from_utf8_lossy(e.as_ref()));
                            out.push_str("-->");
                        });
                    }
                }
                Ok(Event::PI(e)) => {
                    if skipping > 0 {
                        buf.clear();
                        continue;
                    }
                    if nodes.is_empty() {
                        out.push_str("<?");
                        out.push_str(&String::from_utf8_lossy(e.as_ref()));
                        out.push_str("?>\n");
                    } else {
                        write_structural(&mut nodes, &mut pending, out, |out| {
                            out.push_str("<?");
                            out.push_str(&String::from_utf8_lossy(e.as_ref()));
                            out.push_str("?>");
                        });
                    }
                }
                Ok(Event::DocType(e)) => {
                    if skipping == 0 {
                        out.push_str("<!DOCTYPE ");
                        out.push_str(String::from_utf8_lossy(e.as_ref()).trim_start());
                        out.push_str(">\n");
                    }
                }
                // The prolog is regenerated from the detected encoding.
                Ok(Event::Decl(_)) => {}
                Ok(Event::Eof) => break,
                Err(err) => {
                    let line = line_at(scope.text, reader.buffer_position());
                    let message = err.to_string();
                    self.has_fatal = true;
                    let signal = self.report(Severity::Fatal, &message, Some(line));
                    if let Signal::Stop(payload) = signal {
                        return Err(Halt::Stop(payload));
                    }
                    return Err(Halt::Fatal {
                        message,
                        line: Some(line),
                    });
                }
            }
            buf.clear();
        }
        Ok(())
    }

    /// Resolve one inclusion directive and splice its expansion.
    fn process_include(
        &mut self,
        element: &BytesStart<'_>,
        scope: &DocScope<'_>,
        tab: &str,
        line: u64,
        out: &mut String,
    ) -> Result<(), Halt> {
        let mut href: Option<String> = None;
        let mut parse_xml = true;
        for attr in element.attributes().with_checks(false).flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = std::str::from_utf8(&attr.value)
                .ok()
                .and_then(|s| quick_xml::escape::unescape(s).ok())
                .map(|v| v.into_owned())
                .unwrap_or_else(|| String::from_utf8_lossy(&attr.value).into_owned());
            if key == "href" {
                href = Some(value);
            } else if key == "parse" {
                parse_xml = value == "xml";
            }
        }
        let Some(href) = href else {
            return self.warn("include directive without href".to_string(), line);
        };
        if scope.depth >= MAX_INCLUDE_DEPTH {
            return self.warn(
                format!("inclusion of '{}' exceeds the nesting limit", href),
                line,
            );
        }

        // The resolver sees the reference first; its index can remap
        // targets the relative-path logic would miss.
        let mut resolved: Option<(Location, Vec<u8>)> = None;
        if let Some(resolver) = self.resolver.as_mut() {
            if let Some(source) = resolver.resolve_system_id(scope.uri.as_deref(), &href) {
                resolved = Some((source.location.clone(), source.bytes().to_vec()));
            }
        }
        let (child_location, child_bytes) = match resolved {
            Some(resolved) => resolved,
            None => {
                let child = if let Some(dir) = &scope.dir {
                    dir.child(&href)
                } else if is_absolute_reference(&href) {
                    Location::parse(&href)
                } else if let Some(base) = &self.default_base {
                    base.child(&href)
                } else {
                    None
                };
                let Some(child) = child else {
                    return self.warn(format!("invalid href '{}'", href), line);
                };
                if !child.exists() {
                    return self.warn(format!("'{}' does not exist", href), line);
                }
                if child.is_directory() {
                    return self.warn(format!("'{}' is a directory", href), line);
                }
                match child.read_bytes() {
                    Ok(bytes) => (child, bytes),
                    Err(err) => {
                        return self.warn(format!("cannot read '{}': {}", href, err), line);
                    }
                }
            }
        };

        if scope.add_comments {
            out.push_str("<!-- Included file: ");
            out.push_str(&href);
            out.push_str(" -->\n");
        }

        let child_text = match decode_bytes(&child_bytes, None) {
            Ok(text) => text,
            Err(err) => {
                return self.warn(format!("cannot decode '{}': {}", href, err), line);
            }
        };

        if parse_xml {
            let child_scope = DocScope {
                text: &child_text,
                uri: Some(child_location.to_string()),
                dir: child_location.parent(),
                parent_tab: tab,
                depth: scope.depth + 1,
                is_root: false,
                add_comments: scope.add_comments && self.options.deep_comments,
            };
            match self.expand_document(child_scope, out) {
                Ok(()) => Ok(()),
                // The nested document was unparseable; its fatal error has
                // been reported and only its own expansion is abandoned.
                Err(Halt::Fatal { .. }) if !self.options.propagate_nested_fatal => Ok(()),
                Err(halt) => Err(halt),
            }
        } else {
            for (index, text_line) in child_text.lines().enumerate() {
                if index == 0 && text_line.starts_with("<?xml ") {
                    continue;
                }
                out.push_str(text_line);
                out.push('\n');
            }
            Ok(())
        }
    }

    /// Report a warning and skip the inclusion (empty splice).
    fn warn(&mut self, message: String, line: u64) -> Result<(), Halt> {
        log::warn!("{}", message);
        match self.report(Severity::Warning, &message, Some(line)) {
            Signal::Stop(payload) => Err(Halt::Stop(payload)),
            Signal::Continue => Ok(()),
        }
    }

    /// Record a diagnostic and forward it to the configured handler.
    fn report(&mut self, severity: Severity, message: &str, line: Option<u64>) -> Signal {
        let diagnostic = Diagnostic {
            severity,
            message: message.to_string(),
            line,
        };
        self.collected.push(diagnostic.clone());
        match &mut self.handler {
            Some(handler) => match severity {
                Severity::Warning => handler.warning(&diagnostic),
                Severity::Error => handler.error(&diagnostic),
                Severity::Fatal => handler.fatal_error(&diagnostic),
            },
            None => Signal::Continue,
        }
    }
}

/// Flush buffered text, close a pending `>` and write one structural
/// item (comment, CDATA section, processing instruction).
fn write_structural<F>(
    nodes: &mut [OutputNode],
    pending: &mut Option<String>,
    out: &mut String,
    write: F,
) where
    F: FnOnce(&mut String),
{
    if let Some(parent) = nodes.last_mut() {
        parent.has_children = true;
        if !parent.is_started {
            out.push('>');
            parent.is_started = true;
        }
    }
    flush_pending(out, pending);
    write(out);
}

/// Remember the prefix an element binds to the XInclude namespace.
fn remember_include_prefix(element: &BytesStart<'_>, include_prefix: &mut Option<String>) {
    for attr in element.attributes().with_checks(false).flatten() {
        let key = attr.key.as_ref();
        if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            if attr.value.as_ref() == XINCLUDE_NS.as_bytes() {
                *include_prefix = Some(String::from_utf8_lossy(prefix).into_owned());
            }
        }
    }
}

/// Whether a qualified name is the inclusion directive under the bound
/// prefix.
fn is_include_directive(qname: &str, include_prefix: Option<&str>) -> bool {
    let Some(prefix) = include_prefix else {
        return false;
    };
    match qname.rsplit_once(':') {
        Some((qprefix, local)) => qprefix == prefix && local == INCLUDE_ELEMENT,
        None => false,
    }
}

/// Write an element's attributes exactly as they appear in the source.
fn write_attributes(element: &BytesStart<'_>, out: &mut String) {
    for attr in element.attributes().with_checks(false).flatten() {
        out.push(' ');
        out.push_str(&String::from_utf8_lossy(attr.key.as_ref()));
        out.push_str("=\"");
        out.push_str(&String::from_utf8_lossy(&attr.value));
        out.push('"');
    }
}

/// Write buffered character data verbatim.
///
/// Returns the indentation of the line the write ended on — the last
/// line of the text when it is whitespace only — which becomes the
/// include-site tab for marker comments and nested content.
fn flush_pending(out: &mut String, pending: &mut Option<String>) -> Option<String> {
    let text = pending.take()?;
    out.push_str(&text);
    let last_line = text.rsplit('\n').next().unwrap_or("");
    if last_line.chars().all(|c| c == ' ' || c == '\t') {
        Some(last_line.to_string())
    } else {
        Some(String::new())
    }
}

/// 1-based line number of a byte offset in the source text.
fn line_at(text: &str, position: u64) -> u64 {
    let end = (position as usize).min(text.len());
    let newlines = text.as_bytes()[..end]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u64;
    newlines + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(input: &str) -> String {
        let mut includer = XmlIncluder::from_bytes(input.as_bytes().to_vec());
        includer.content().unwrap()
    }

    #[test]
    fn test_self_closing_empty_element() {
        assert_eq!(expand_str("<a/>"), "<a/>");
        assert_eq!(expand_str("<a></a>"), "<a/>");
    }

    #[test]
    fn test_element_with_text_keeps_close_tag() {
        assert_eq!(expand_str("<a>txt</a>"), "<a>txt</a>");
    }

    #[test]
    fn test_nested_elements_without_whitespace() {
        assert_eq!(expand_str("<a><b/></a>"), "<a><b/></a>");
    }

    #[test]
    fn test_whitespace_is_preserved() {
        let input = "<a>\n  <b attr=\"1\"/>\n</a>";
        assert_eq!(expand_str(input), input);
    }

    #[test]
    fn test_attributes_keep_order_and_raw_values() {
        let input = "<a z=\"1\" a=\"x &amp; y\"/>";
        assert_eq!(expand_str(input), input);
    }

    #[test]
    fn test_comment_is_preserved() {
        let input = "<a>\n  <!-- note -->\n</a>";
        assert_eq!(expand_str(input), input);
    }

    #[test]
    fn test_cdata_is_preserved() {
        let input = "<a><![CDATA[x < y]]></a>";
        assert_eq!(expand_str(input), input);
    }

    #[test]
    fn test_entity_reference_is_preserved() {
        let input = "<a>x &lt; y &custom;</a>";
        assert_eq!(expand_str(input), input);
    }

    #[test]
    fn test_prolog_regenerated_from_declared_encoding() {
        let input = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>\n";
        assert_eq!(
            expand_str(input),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>\n"
        );
    }

    #[test]
    fn test_no_prolog_without_encoding() {
        assert_eq!(expand_str("<a/>"), "<a/>");
    }

    #[test]
    fn test_fatal_error_in_root_aborts() {
        let mut includer = XmlIncluder::from_bytes(b"<a><b></a>".to_vec());
        let err = includer.content().unwrap_err();
        assert!(matches!(err, WeaveError::FatalParse { .. }));
        assert!(includer.has_fatal_error());
        assert!(includer.partial_output().is_some());
        assert_eq!(includer.diagnostics().len(), 1);
        assert_eq!(includer.diagnostics()[0].severity, Severity::Fatal);
    }

    #[test]
    fn test_missing_root_source() {
        let mut includer = XmlIncluder::from_path("/nonexistent/doc.xml");
        assert!(matches!(
            includer.content(),
            Err(WeaveError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_line_numbers() {
        assert_eq!(line_at("a\nb\nc", 0), 1);
        assert_eq!(line_at("a\nb\nc", 2), 2);
        assert_eq!(line_at("a\nb\nc", 4), 3);
    }

    #[test]
    fn test_include_directive_detection() {
        assert!(is_include_directive("xi:include", Some("xi")));
        assert!(!is_include_directive("xi:include", Some("other")));
        assert!(!is_include_directive("include", Some("xi")));
        assert!(!is_include_directive("xi:fallback", Some("xi")));
        assert!(!is_include_directive("xi:include", None));
    }
}
