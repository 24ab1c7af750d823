//! Regression tests pinning edge-case behavior
//!
//! Each test documents a policy decision or a behavior that is easy to
//! break while refactoring: the nested-fatal policy in both directions,
//! cooperative stop, the inclusion nesting limit, and the memoization
//! side effects of sibling inference.

use std::fs;

use xmlweave::{
    Diagnostic, EntityResolver, ErrorHandler, Location, Severity, Signal, WeaveError, XmlIncluder,
};

fn fixture(name: &str) -> String {
    format!("tests/fixtures/{}", name)
}

// =============================================================================
// Nested fatal errors
// =============================================================================

#[test]
fn nested_fatal_default_keeps_outer_document() {
    let mut includer = XmlIncluder::from_path(fixture("nested-fatal.xml"));
    let expanded = includer
        .content()
        .expect("outer document must survive a nested fatal error");
    assert!(expanded.contains("<before/>"));
    assert!(
        expanded.contains("<after/>"),
        "content after the broken inclusion must still be written"
    );
    assert!(includer.has_fatal_error());
    let fatals: Vec<&Diagnostic> = includer
        .diagnostics()
        .iter()
        .filter(|d| d.severity == Severity::Fatal)
        .collect();
    assert_eq!(fatals.len(), 1, "the nested fatal must be reported once");
}

#[test]
fn nested_fatal_propagates_when_configured() {
    let mut includer = XmlIncluder::from_path(fixture("nested-fatal.xml"));
    includer.options_mut().propagate_nested_fatal = true;
    let err = includer.content().unwrap_err();
    assert!(matches!(err, WeaveError::FatalParse { .. }));
    let partial = includer.partial_output().unwrap();
    assert!(partial.contains("<before/>"));
    assert!(
        !partial.contains("<after/>"),
        "propagation must abort before the content after the inclusion"
    );
}

// =============================================================================
// Cooperative stop
// =============================================================================

struct StopOnWarning;

impl ErrorHandler for StopOnWarning {
    fn warning(&mut self, _diagnostic: &Diagnostic) -> Signal {
        Signal::Stop(Some("stopped by handler".to_string()))
    }
}

#[test]
fn stop_signal_terminates_expansion_with_payload() {
    let mut includer = XmlIncluder::from_path(fixture("missing-include.xml"));
    includer.set_error_handler(Box::new(StopOnWarning));
    let err = includer.content().unwrap_err();
    match err {
        WeaveError::Stopped { payload } => {
            assert_eq!(payload.as_deref(), Some("stopped by handler"));
        }
        other => panic!("expected Stopped, got {:?}", other),
    }
    assert_eq!(includer.stop_payload(), Some("stopped by handler"));
    let partial = includer.partial_output().unwrap();
    assert!(partial.contains("<root"));
    // The diagnostic that triggered the stop is still on record.
    assert_eq!(includer.diagnostics().len(), 1);
}

// =============================================================================
// Inclusion nesting limit
// =============================================================================

#[test]
fn self_inclusion_hits_nesting_limit() {
    let mut includer = XmlIncluder::from_path(fixture("cycle.xml"));
    let expanded = includer
        .content()
        .expect("a cyclic inclusion must terminate, not recurse forever");
    assert!(expanded.contains("<a"));
    assert!(
        includer
            .diagnostics()
            .iter()
            .any(|d| d.severity == Severity::Warning && d.message.contains("nesting limit")),
        "the cut-off must be reported as a warning"
    );
}

// =============================================================================
// Expansion result caching
// =============================================================================

#[test]
fn content_is_computed_once() {
    let mut includer = XmlIncluder::from_path(fixture("missing-include.xml"));
    let first = includer.content().unwrap();
    let second = includer.content().unwrap();
    assert_eq!(first, second);
    // A second call replays the cached result instead of re-expanding,
    // so the warning is not reported twice.
    assert_eq!(includer.diagnostics().len(), 1);
}

// =============================================================================
// Sibling inference side effects
// =============================================================================

#[test]
fn sibling_inference_memoizes_into_the_index() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.xsd"), "<xs:schema/>").unwrap();
    fs::write(dir.path().join("b.xsd"), "<xs:schema/>").unwrap();

    let mut resolver = EntityResolver::new();
    resolver.add_system_id(
        "http://example.com/s/a.xsd",
        Location::from_path(dir.path().join("a.xsd")),
    );

    assert!(!resolver.is_resolving_system_id("b.xsd"));
    let first = resolver.resolve_system_id(None, "b.xsd").unwrap();
    assert!(
        resolver.is_resolving_system_id("b.xsd"),
        "the inferred resolution must be registered"
    );

    let second = resolver.resolve_system_id(None, "b.xsd").unwrap();
    assert_eq!(first.location, second.location);
}

#[test]
fn unresolved_reference_leaves_index_untouched() {
    let mut resolver = EntityResolver::new();
    assert!(resolver.resolve_system_id(None, "ghost.xsd").is_none());
    assert!(!resolver.is_resolving_system_id("ghost.xsd"));
    assert!(!resolver.is_resolving_system_entities());
}

// =============================================================================
// Attribute and namespace fidelity
// =============================================================================

#[test]
fn xinclude_namespace_declaration_survives_on_kept_elements() {
    let mut includer = XmlIncluder::from_path(fixture("parent-compact.xml"));
    let expanded = includer.content().unwrap();
    assert!(
        expanded.contains("xmlns:xi=\"http://www.w3.org/2001/XInclude\""),
        "the namespace declaration sits on <root>, which is kept"
    );
    assert!(
        !expanded.contains("<xi:include"),
        "the directive itself must not survive"
    );
}

#[test]
fn include_without_href_is_skipped_with_warning() {
    let doc = b"<r xmlns:xi=\"http://www.w3.org/2001/XInclude\"><xi:include/></r>".to_vec();
    let mut includer = XmlIncluder::from_bytes(doc);
    let expanded = includer.content().unwrap();
    assert_eq!(expanded, "<r xmlns:xi=\"http://www.w3.org/2001/XInclude\"></r>");
    assert_eq!(includer.diagnostics().len(), 1);
    assert_eq!(includer.diagnostics()[0].severity, Severity::Warning);
}

#[test]
fn in_memory_document_uses_default_base_directory() {
    let doc = b"<r xmlns:xi=\"http://www.w3.org/2001/XInclude\"><xi:include href=\"child.xml\"/></r>"
        .to_vec();
    let mut includer = XmlIncluder::from_bytes(doc);
    includer.set_default_base_directory(Location::from_path("tests/fixtures"));
    let expanded = includer.content().unwrap();
    assert!(expanded.contains("<c/>"));
}
