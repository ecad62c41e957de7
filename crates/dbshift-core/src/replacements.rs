use std::collections::HashSet;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Everything except alphanumerics, `-`, `_` and `.` gets percent-encoded,
/// matching the classic form-urlencode rules (space becomes `+`).
const URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Ordered `search → replacement` mapping with unique keys. The first
/// registration of a key wins; later registrations are ignored. Fixed for
/// the duration of a run.
#[derive(Clone, Debug, Default)]
pub struct ReplacementSet {
    pairs: Vec<(String, String)>,
    keys: HashSet<String>,
}

impl ReplacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair. Returns false when the key was already present.
    pub fn insert(&mut self, search: impl Into<String>, replace: impl Into<String>) -> bool {
        let search = search.into();
        if search.is_empty() || self.keys.contains(&search) {
            return false;
        }
        self.keys.insert(search.clone());
        self.pairs.push((search, replace.into()));
        true
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in registration order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(s, r)| (s.as_str(), r.as_str()))
    }
}

/// Escape LIKE special characters for safe pattern matching.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Form-urlencode a string: space to `+`, `-_.` and alphanumerics kept,
/// everything else percent-encoded with uppercase hex.
pub fn urlencode(s: &str) -> String {
    utf8_percent_encode(s, URLENCODE_SET)
        .to_string()
        .replace("%20", "+")
}

/// The JSON string-literal escaping of `s`, without the surrounding quotes.
/// Forward slashes are escaped as `\/`, the form PHP's json_encode writes
/// into stored data.
pub fn json_escape(s: &str) -> String {
    let quoted = serde_json::Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].replace('/', "\\/")
}

/// Encoded forms a value may take inside stored data: raw, urlencoded,
/// JSON-escaped, and urlencoded-JSON-escaped. Order is significant; pair
/// expansion matches source and target variant by variant.
fn encoded_variants(s: &str) -> [String; 4] {
    let jse = json_escape(s);
    [s.to_string(), urlencode(s), jse.clone(), urlencode(&jse)]
}

/// A search string is worth registering only when it is non-empty and not a
/// bare number; replacing numerals everywhere would corrupt unrelated data.
fn is_replaceable(s: &str) -> bool {
    !s.trim().is_empty() && s.trim().parse::<f64>().is_err()
}

fn strip_www(host: &str) -> &str {
    if host.len() > 4 && host[..4].eq_ignore_ascii_case("www.") {
        &host[4..]
    } else {
        host
    }
}

/// Builds the resolved [`ReplacementSet`] and the LIKE probe patterns for a
/// run. Categories must be registered in priority order: text pairs first,
/// then directory pairs, then URL pairs; within the expansion the first
/// registration of any derived key wins.
#[derive(Debug, Default)]
pub struct ReplacementBuilder {
    base: ReplacementSet,
    probes: Vec<String>,
    protect_email: bool,
}

impl ReplacementBuilder {
    pub fn new(protect_email: bool) -> Self {
        Self {
            protect_email,
            ..Default::default()
        }
    }

    fn probe(&mut self, s: &str) {
        if !s.is_empty() && !self.probes.iter().any(|p| p == s) {
            self.probes.push(s.to_string());
        }
    }

    /// Register a literal text pair.
    pub fn text(&mut self, search: &str, replace: &str) {
        if !is_replaceable(search) || !is_replaceable(replace) {
            return;
        }
        self.probe(search);
        self.base.insert(search, replace);
    }

    /// Register a directory pair plus separator-normalized variants.
    pub fn dir(&mut self, search: &str, replace: &str) {
        if !is_replaceable(search) || !is_replaceable(replace) {
            return;
        }

        let src = DirParts::parse(search);
        if src.rel.is_empty() {
            self.probe(search);
            self.base.insert(search, replace);
            return;
        }
        self.probe(&src.rel);
        let tgt = DirParts::parse(replace);

        self.base.insert(search, replace);
        self.base.insert(
            format!("{}{}{}", src.lead, src.rel, src.sep),
            format!("{}{}{}", tgt.lead, tgt.rel, tgt.sep),
        );
        self.base.insert(
            format!("{}{}", src.lead, src.rel),
            format!("{}{}", tgt.lead, tgt.rel),
        );

        // Lead-less forms only when both sides are multi-segment absolute
        // paths; a single bare segment would match far too much.
        if src.rel.contains(src.sep)
            && tgt.rel.contains(tgt.sep)
            && !src.lead.is_empty()
            && !tgt.lead.is_empty()
        {
            self.base.insert(
                format!("{}{}", src.rel, src.sep),
                format!("{}{}", tgt.rel, tgt.sep),
            );
            self.base.insert(src.rel.clone(), tgt.rel.clone());
        }
    }

    /// Register a URL pair plus scheme/slash/www variants. When either side
    /// does not parse as an absolute URL only the literal pair is taken.
    pub fn url(&mut self, search: &str, replace: &str) {
        if !is_replaceable(search) || !is_replaceable(replace) {
            return;
        }

        self.base.insert(search, replace);

        let (Some(src), Some(tgt)) = (UrlParts::parse(search), UrlParts::parse(replace)) else {
            self.probe(search);
            return;
        };
        self.probe(strip_www(&src.host));

        if self.protect_email {
            let domain = strip_www(&src.host);
            if !domain.is_empty() {
                let at = format!("@{domain}");
                self.base.insert(at.clone(), at);
            }
        }

        for (s, t) in src.variants().into_iter().zip(tgt.variants()) {
            self.base.insert(s, t);
        }
    }

    /// Expand the registered base pairs into encoded variants and derive the
    /// LIKE probe patterns. Consumes the builder.
    pub fn finish(self) -> (ReplacementSet, Vec<String>) {
        let mut set = ReplacementSet::new();
        for (search, replace) in self.base.pairs() {
            let searches = encoded_variants(search);
            let replaces = encoded_variants(replace);
            for (s, r) in searches.into_iter().zip(replaces) {
                set.insert(s, r);
            }
        }

        let mut patterns = Vec::new();
        for probe in &self.probes {
            for variant in encoded_variants(probe) {
                let pattern = format!("%{}%", escape_like(&variant));
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
        }

        (set, patterns)
    }
}

/// Host-and-path split of an absolute URL, for variant derivation.
struct UrlParts {
    scheme: String,
    /// userinfo@host:port as written (modulo URL normalization).
    host: String,
    /// Path with leading/trailing separators trimmed; may be empty.
    path: String,
    /// `?query#fragment` suffix; may be empty.
    query_fragment: String,
}

impl UrlParts {
    fn parse(s: &str) -> Option<Self> {
        let url = Url::parse(s).ok()?;
        let host = url.host_str()?.to_string();

        let mut authority = String::new();
        if !url.username().is_empty() {
            authority.push_str(url.username());
            if let Some(pass) = url.password() {
                authority.push(':');
                authority.push_str(pass);
            }
            authority.push('@');
        }
        authority.push_str(&host);
        if let Some(port) = url.port() {
            authority.push_str(&format!(":{port}"));
        }

        let mut query_fragment = String::new();
        if let Some(q) = url.query() {
            query_fragment.push('?');
            query_fragment.push_str(q);
        }
        if let Some(f) = url.fragment() {
            query_fragment.push('#');
            query_fragment.push_str(f);
        }

        Some(Self {
            scheme: url.scheme().to_string(),
            host: authority,
            path: url.path().trim_matches(|c| c == '/' || c == '\\').to_string(),
            query_fragment,
        })
    }

    /// The twelve written forms a URL takes in stored data: full scheme,
    /// protocol-relative and bare-host forms, each with slashed and plain
    /// path, and the same six again with the `www.` prefix stripped.
    fn variants(&self) -> Vec<String> {
        let slashed = if self.path.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", self.path)
        };
        let plain = if self.path.is_empty() {
            String::new()
        } else {
            format!("/{}", self.path)
        };
        let qf = &self.query_fragment;

        let mut out = Vec::with_capacity(12);
        for host in [self.host.as_str(), strip_www(&self.host)] {
            for path in [&slashed, &plain] {
                out.push(format!("{}://{host}{path}{qf}", self.scheme));
            }
            for path in [&slashed, &plain] {
                out.push(format!("//{host}{path}{qf}"));
            }
            for path in [&slashed, &plain] {
                out.push(format!("{host}{path}{qf}"));
            }
        }
        out
    }
}

/// Separator-normalized decomposition of a filesystem path.
struct DirParts {
    /// `/` or `\`, as the path itself uses.
    sep: char,
    /// Leading `/`, `\` or Windows drive root as written; empty if relative.
    lead: String,
    /// Segments joined with a single separator, no lead.
    rel: String,
}

impl DirParts {
    fn parse(s: &str) -> Self {
        let sep = if s.contains('\\') { '\\' } else { '/' };

        let lead = if s.starts_with('\\') {
            "\\".to_string()
        } else if s.starts_with('/') {
            "/".to_string()
        } else {
            Self::drive_root(s).unwrap_or_default()
        };

        let body = &s[lead.len()..];
        let rel = body
            .split(['/', '\\'])
            .filter(|seg| !seg.is_empty())
            .collect::<Vec<_>>()
            .join(&sep.to_string());

        Self { sep, lead, rel }
    }

    /// `C:`, `C:\`, `C:/` etc. at the start of a Windows path, as written.
    fn drive_root(s: &str) -> Option<String> {
        let bytes = s.as_bytes();
        if bytes.len() < 2 || !bytes[0].is_ascii_alphabetic() || bytes[1] != b':' {
            return None;
        }
        let mut end = 2;
        while end < bytes.len() && (bytes[end] == b'/' || bytes[end] == b'\\') {
            end += 1;
        }
        Some(s[..end].to_string())
    }
}
