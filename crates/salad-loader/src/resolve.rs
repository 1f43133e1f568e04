//! Identifier resolution against a base and a namespace table.

use indexmap::IndexMap;
use url::Url;

use crate::vocab::expand_namespace;

/// Split `doc#frag` into `("doc", Some("frag"))`.
pub fn split_fragment(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('#') {
        Some((document, fragment)) => (document, Some(fragment)),
        None => (uri, None),
    }
}

/// Resolve an identifier.
///
/// Order: blank node ids (`_:`) as-is, namespace prefix expansion, absolute
/// identifiers as-is, then relative to `base`.
pub fn resolve_uri(
    value: &str,
    base: &str,
    namespaces: &IndexMap<String, String>,
) -> Result<String, String> {
    if value.is_empty() {
        return Err("identifier is empty".to_string());
    }
    if value.starts_with("_:") {
        return Ok(value.to_string());
    }
    if let Some(expanded) = expand_namespace(value, namespaces) {
        return Ok(expanded);
    }
    if Url::parse(value).is_ok() {
        return Ok(value.to_string());
    }
    if base.is_empty() {
        return Ok(value.to_string());
    }
    match Url::parse(base) {
        Ok(base_url) => base_url
            .join(value)
            .map(String::from)
            .map_err(|e| e.to_string()),
        // Non-URL bases only support fragment references
        Err(_) => match value.strip_prefix('#') {
            Some(fragment) => Ok(format!("{}#{fragment}", split_fragment(base).0)),
            None => Ok(value.to_string()),
        },
    }
}

/// Resolve a record identifier, scoping bare names under the base.
///
/// `w1` under `file:///doc.yml` becomes `file:///doc.yml#w1`; under
/// `file:///doc.yml#parent` it becomes `file:///doc.yml#parent/w1`.
/// Identifiers that are absolute, prefixed or carry a fragment resolve as
/// ordinary identifiers.
pub fn resolve_scoped_id(
    value: &str,
    base: &str,
    namespaces: &IndexMap<String, String>,
) -> Result<String, String> {
    if !is_plain_name(value, namespaces) || base.is_empty() {
        return resolve_uri(value, base, namespaces);
    }
    match split_fragment(base) {
        (document, Some(fragment)) if !fragment.is_empty() => {
            Ok(format!("{document}#{fragment}/{value}"))
        }
        (document, _) => Ok(format!("{document}#{value}")),
    }
}

/// Resolve a reference under an ancestor scope of the base.
///
/// The last `levels` segments of the base fragment are dropped before the
/// name is appended: `x` under `file:///wf.cwl#main/step` with one level
/// becomes `file:///wf.cwl#main/x`. Non-plain names resolve as ordinary
/// identifiers.
pub fn resolve_ref_scope(
    value: &str,
    base: &str,
    namespaces: &IndexMap<String, String>,
    levels: usize,
) -> Result<String, String> {
    if !is_plain_name(value, namespaces) || base.is_empty() {
        return resolve_uri(value, base, namespaces);
    }
    let (document, fragment) = split_fragment(base);
    let mut segments = fragment_segments(fragment);
    segments.truncate(segments.len().saturating_sub(levels));
    segments.push(value);
    Ok(format!("{document}#{}", segments.join("/")))
}

fn is_plain_name(value: &str, namespaces: &IndexMap<String, String>) -> bool {
    !value.is_empty()
        && !value.contains('#')
        && !value.starts_with("_:")
        && expand_namespace(value, namespaces).is_none()
        && Url::parse(value).is_err()
}

fn fragment_segments(fragment: Option<&str>) -> Vec<&str> {
    match fragment {
        Some(fragment) if !fragment.is_empty() => fragment.split('/').collect(),
        _ => Vec::new(),
    }
}

/// How an identifier field resolves its values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UriScope {
    /// Resolved like a relative reference.
    #[default]
    Reference,
    /// Bare names are scoped under the base (`base#name`).
    Scoped,
    /// Bare names are scoped under an ancestor of the base, this many
    /// fragment segments up.
    RefScope(usize),
}

/// Shorten `uri` so that it resolves back to itself under `base` with the
/// given scope.
///
/// Identifiers on another scheme or host are returned unchanged.
pub fn relativize(uri: &str, base: &str, scope: UriScope) -> String {
    if uri == base {
        return uri.to_string();
    }
    let (Ok(target), Ok(base_url)) = (Url::parse(uri), Url::parse(base)) else {
        return uri.to_string();
    };
    if target.scheme() != base_url.scheme()
        || target.host_str() != base_url.host_str()
        || target.port() != base_url.port()
        || target.query() != base_url.query()
    {
        return uri.to_string();
    }
    if target.path() != base_url.path() {
        let mut relative = relative_path(base_url.path(), target.path());
        if let Some(fragment) = target.fragment() {
            relative.push('#');
            relative.push_str(fragment);
        }
        return relative;
    }

    let Some(fragment) = target.fragment().filter(|f| !f.is_empty()) else {
        return relative_path(base_url.path(), target.path());
    };
    let mut segments = fragment_segments(base_url.fragment());
    match scope {
        UriScope::Reference => return format!("#{fragment}"),
        UriScope::Scoped => {}
        UriScope::RefScope(levels) => {
            segments.truncate(segments.len().saturating_sub(levels));
        }
    }
    let prefix = if segments.is_empty() {
        String::new()
    } else {
        format!("{}/", segments.join("/"))
    };
    match fragment.strip_prefix(prefix.as_str()) {
        Some(name) if !name.is_empty() && !name.contains('#') => name.to_string(),
        _ => format!("#{fragment}"),
    }
}

/// Relative reference from the document at `base` to the path `target`.
fn relative_path(base: &str, target: &str) -> String {
    let mut base_dir: Vec<&str> = base.split('/').collect();
    base_dir.pop();
    let target_segments: Vec<&str> = target.split('/').collect();
    let (file, target_dir) = target_segments
        .split_last()
        .map_or(("", &[][..]), |(file, dir)| (*file, dir));

    let common = base_dir
        .iter()
        .zip(target_dir)
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative = "../".repeat(base_dir.len() - common);
    for segment in &target_dir[common..] {
        relative.push_str(segment);
        relative.push('/');
    }
    relative.push_str(file);
    // A first segment holding `:` would read as a scheme.
    if relative.is_empty() || relative.split('/').next().is_some_and(|s| s.contains(':')) {
        relative.insert_str(0, "./");
    }
    relative
}
