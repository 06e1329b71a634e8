//! Provide methods for expanding system identifiers.
//!
//! Reference resolution follows RFC 3986 section 5.2.

use std::{
    borrow::Cow,
    env::current_dir,
    path::{Path, PathBuf},
    string::FromUtf8Error,
};

use crate::error::{XmlError, XmlErrorDomain, XmlErrorLevel, XmlParserErrors};

fn is_mark(c: u8) -> bool {
    matches!(c, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || is_mark(c)
}

fn to_hexdigit(c: u8) -> char {
    (if c < 10 { c + b'0' } else { c - 10 + b'A' }) as char
}

/// Check if `id` starts with a URI scheme.
///
/// `scheme ::= ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`
///
/// A single letter followed by a colon is a drive letter, not a scheme.
pub fn has_scheme(id: &str) -> bool {
    let Some(colon) = id.find(':') else {
        return false;
    };
    let scheme = &id.as_bytes()[..colon];
    scheme.len() > 1
        && scheme[0].is_ascii_alphabetic()
        && scheme[1..]
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

/// Escape every byte of `s` that is neither unreserved nor listed in `except`.
#[doc(alias = "xmlURIEscapeStr")]
pub fn escape_url_except<'a>(s: &'a str, except: &[u8]) -> Cow<'a, str> {
    if s.bytes().all(|b| is_unreserved(b) || except.contains(&b)) {
        return Cow::Borrowed(s);
    }
    let mut ret = String::with_capacity(s.len() + 8);
    for b in s.bytes() {
        if is_unreserved(b) || except.contains(&b) {
            ret.push(b as char);
        } else {
            ret.push('%');
            ret.push(to_hexdigit(b >> 4));
            ret.push(to_hexdigit(b & 0x0F));
        }
    }
    Cow::Owned(ret)
}

/// Unescape `%XX` sequences of `url`.
#[doc(alias = "xmlURIUnescapeString")]
pub fn unescape_url(url: &str) -> Result<Cow<'_, str>, FromUtf8Error> {
    if !url.contains('%') {
        return Ok(Cow::Borrowed(url));
    }
    let bytes = url.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i..] {
            [b'%', hi, lo, ..] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                let hex = |c: u8| (c as char).to_digit(16).unwrap_or(0) as u8;
                out.push((hex(hi) << 4) | hex(lo));
                i += 3;
            }
            [b, ..] => {
                out.push(b);
                i += 1;
            }
            [] => break,
        }
    }
    String::from_utf8(out).map(Cow::Owned)
}

fn has_invalid_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

/// The five components of a URI reference.
#[derive(Debug, Default, PartialEq)]
struct XmlURIParts<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> XmlURIParts<'a> {
    fn parse(mut s: &'a str) -> Self {
        let mut parts = Self::default();
        if let Some((rest, fragment)) = s.split_once('#') {
            parts.fragment = Some(fragment);
            s = rest;
        }
        if let Some((rest, query)) = s.split_once('?') {
            parts.query = Some(query);
            s = rest;
        }
        if has_scheme(s) {
            if let Some((scheme, rest)) = s.split_once(':') {
                parts.scheme = Some(scheme);
                s = rest;
            }
        }
        if let Some(rest) = s.strip_prefix("//") {
            let end = rest.find('/').unwrap_or(rest.len());
            parts.authority = Some(&rest[..end]);
            s = &rest[end..];
        }
        parts.path = s;
        parts
    }

    fn recompose(&self, path: &str) -> String {
        let mut ret = String::new();
        if let Some(scheme) = self.scheme {
            ret.push_str(scheme);
            ret.push(':');
        }
        if let Some(authority) = self.authority {
            ret.push_str("//");
            ret.push_str(authority);
        }
        ret.push_str(path);
        if let Some(query) = self.query {
            ret.push('?');
            ret.push_str(query);
        }
        if let Some(fragment) = self.fragment {
            ret.push('#');
            ret.push_str(fragment);
        }
        ret
    }
}

/// Remove `.` and `..` segments from `path`.
#[doc(alias = "xmlNormalizeURIPath")]
pub fn normalize_uri_path(path: &str) -> Cow<'_, str> {
    if !path.split('/').any(|seg| seg == "." || seg == "..") {
        return Cow::Borrowed(path);
    }
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = vec![];
    let mut trailing_slash = false;
    for seg in path.split('/').skip(absolute as usize) {
        trailing_slash = false;
        match seg {
            "." => trailing_slash = true,
            ".." => {
                if segments.last().is_some_and(|&last| last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
                trailing_slash = true;
            }
            seg => segments.push(seg),
        }
    }
    let mut ret = String::with_capacity(path.len());
    if absolute {
        ret.push('/');
    }
    ret.push_str(&segments.join("/"));
    if trailing_slash && !ret.is_empty() && !ret.ends_with('/') {
        ret.push('/');
    }
    Cow::Owned(ret)
}

/// Resolve the reference `uri` against the absolute URI `base`.
#[doc(alias = "xmlBuildURI")]
pub fn build_uri(uri: &str, base: &str) -> Option<String> {
    let refe = XmlURIParts::parse(uri);
    if refe.scheme.is_some() {
        return Some(uri.to_owned());
    }
    let bas = XmlURIParts::parse(base);
    bas.scheme?;
    let mut res = XmlURIParts {
        scheme: bas.scheme,
        fragment: refe.fragment,
        ..Default::default()
    };
    let path = if refe.authority.is_some() {
        res.authority = refe.authority;
        res.query = refe.query;
        normalize_uri_path(refe.path).into_owned()
    } else {
        res.authority = bas.authority;
        if refe.path.is_empty() {
            res.query = refe.query.or(bas.query);
            bas.path.to_owned()
        } else {
            res.query = refe.query;
            if refe.path.starts_with('/') {
                normalize_uri_path(refe.path).into_owned()
            } else {
                let mut merged = match bas.path.rfind('/') {
                    Some(pos) => bas.path[..=pos].to_owned(),
                    None if bas.authority.is_some() => "/".to_owned(),
                    None => String::new(),
                };
                merged.push_str(refe.path);
                normalize_uri_path(&merged).into_owned()
            }
        }
    };
    Some(res.recompose(&path))
}

/// Construct a `file:` URI from an absolute path.
#[doc(alias = "xmlPathToURI")]
pub fn path_to_uri(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    let path = escape_url_except(&path, b"/:@&=+$,;");
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        format!("file:///{path}")
    }
}

/// Return the local path of a `file:` URI.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let parts = XmlURIParts::parse(uri);
    if !parts.scheme?.eq_ignore_ascii_case("file") {
        return None;
    }
    if parts
        .authority
        .is_some_and(|auth| !auth.is_empty() && !auth.eq_ignore_ascii_case("localhost"))
    {
        return None;
    }
    let path = unescape_url(parts.path).ok()?;
    // "/C:/dir" is a drive path
    let path = match path.as_bytes() {
        [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() && cfg!(windows) => &path[1..],
        _ => &path[..],
    };
    Some(PathBuf::from(path))
}

/// Return the URI of the working directory, ending with a slash.
fn working_directory_uri() -> Option<String> {
    let cwd = current_dir().ok()?;
    let mut uri = path_to_uri(&cwd);
    if !uri.ends_with('/') {
        uri.push('/');
    }
    Some(uri)
}

fn invalid_uri(id: &str) -> XmlError {
    XmlError::new(
        XmlErrorDomain::XmlFromIO,
        XmlParserErrors::XmlErrInvalidURI,
        XmlErrorLevel::XmlErrFatal,
        format!("Invalid URI: {id}\n"),
    )
    .with_str1(id.to_owned())
}

/// Fix path separators and drive letters of a system identifier.
fn fix_system_id(id: &str) -> Cow<'_, str> {
    let id = if id.contains('\\') {
        Cow::Owned(id.replace('\\', "/"))
    } else {
        Cow::Borrowed(id)
    };
    let with_drive =
        matches!(id.as_bytes(), [drive, b':', b'/', ..] if drive.is_ascii_alphabetic());
    let escaped = match escape_url_except(&id, b"/:@&=+$,;?#%") {
        Cow::Borrowed(_) => None,
        Cow::Owned(escaped) => Some(escaped),
    };
    let id = escaped.map(Cow::Owned).unwrap_or(id);
    if with_drive {
        Cow::Owned(format!("file:///{id}"))
    } else {
        id
    }
}

/// Expand a system identifier to an absolute URI.
///
/// If `id` is already absolute, `Ok(None)` is returned: no transformation was
/// necessary. Otherwise `id` is resolved against `base`, or against the working
/// directory if `base` is `None`.
pub fn expand_system_id(id: &str, base: Option<&str>) -> Result<Option<String>, XmlError> {
    if id.is_empty() {
        return Ok(None);
    }
    if has_invalid_escape(id) {
        return Err(invalid_uri(id));
    }
    if has_scheme(id) {
        return Ok(None);
    }
    let fixed = fix_system_id(id);
    if has_scheme(&fixed) {
        return Ok(Some(fixed.into_owned()));
    }
    let base = match base.filter(|base| !base.is_empty()) {
        Some(base) if has_scheme(base) => Cow::Borrowed(base),
        Some(base) => {
            let base = fix_system_id(base);
            if has_scheme(&base) {
                base
            } else {
                let cwd = working_directory_uri().ok_or_else(|| invalid_uri(id))?;
                let base = build_uri(&base, &cwd).ok_or_else(|| invalid_uri(id))?;
                Cow::Owned(base)
            }
        }
        None => Cow::Owned(working_directory_uri().ok_or_else(|| invalid_uri(id))?),
    };
    build_uri(&fixed, &base)
        .map(Some)
        .ok_or_else(|| invalid_uri(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_ids_are_not_transformed() {
        assert_eq!(expand_system_id("http://a/b/c.dtd", None).unwrap(), None);
        assert_eq!(
            expand_system_id("file:///tmp/x.ent", Some("http://a/b")).unwrap(),
            None
        );
        assert_eq!(expand_system_id("", None).unwrap(), None);
    }

    #[test]
    fn relative_ids_are_resolved_against_base() {
        let base = Some("http://a/b/c/d;p?q");
        let cases = [
            ("g", "http://a/b/c/g"),
            ("./g", "http://a/b/c/g"),
            ("g/", "http://a/b/c/g/"),
            ("/g", "http://a/g"),
            ("//g", "http://g"),
            ("g?y", "http://a/b/c/g?y"),
            ("g#s", "http://a/b/c/g#s"),
            (".", "http://a/b/c/"),
            ("..", "http://a/b/"),
            ("../g", "http://a/b/g"),
            ("../..", "http://a/"),
            ("../../g", "http://a/g"),
            ("../../../g", "http://a/g"),
        ];
        for (id, expected) in cases {
            assert_eq!(
                expand_system_id(id, base).unwrap().as_deref(),
                Some(expected),
                "{id}"
            );
        }
    }

    #[test]
    fn separators_and_drive_letters() {
        assert_eq!(
            expand_system_id("sub\\x.ent", Some("file:///doc/main.xml"))
                .unwrap()
                .as_deref(),
            Some("file:///doc/sub/x.ent")
        );
        assert_eq!(
            expand_system_id("C:\\dtd\\x.dtd", None).unwrap().as_deref(),
            Some("file:///C:/dtd/x.dtd")
        );
        assert_eq!(
            expand_system_id("my file.ent", Some("file:///doc/")).unwrap().as_deref(),
            Some("file:///doc/my%20file.ent")
        );
    }

    #[test]
    fn relative_without_base_uses_working_directory() {
        let expanded = expand_system_id("missing.ent", None).unwrap().unwrap();
        assert!(expanded.starts_with("file:///"));
        assert!(expanded.ends_with("/missing.ent"));
    }

    #[test]
    fn malformed_escape_is_rejected() {
        let err = expand_system_id("a%zz.ent", None).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrInvalidURI);
    }

    #[test]
    fn file_uri_round_trip() {
        let path = Path::new("/tmp/some dir/a.xml");
        let uri = path_to_uri(path);
        assert_eq!(uri, "file:///tmp/some%20dir/a.xml");
        assert_eq!(uri_to_path(&uri), Some(PathBuf::from("/tmp/some dir/a.xml")));
        assert_eq!(uri_to_path("http://host/a.xml"), None);
    }

    #[test]
    fn unescape() {
        assert_eq!(
            unescape_url("%F0%9F%91%BE%20Exterminate%21").unwrap(),
            "\u{1F47E} Exterminate!"
        );
        assert!(matches!(unescape_url("plain"), Ok(Cow::Borrowed("plain"))));
    }
}
