#![forbid(unsafe_code)]

//! The edge cache channel: a cookie-shaped, pre-render-readable mirror of
//! the currently applied color.
//!
//! # The stale-variant hazard
//!
//! A cookie's identity is its name *plus* its attributes. A value written
//! years ago under `path=/admin` will shadow a fresh write under `path=/` on
//! every admin page, and the first paint silently reverts to the old color.
//! The only robust write is therefore a sweep: delete the key under every
//! attribute variant it might ever have been written under, then write one
//! canonical variant. [`EdgeCacheChannel::write`] implements exactly that
//! routine and nothing else writes to the jar.
//!
//! # Encoding
//!
//! Values are typed as [`ChannelValue`]: numeric fields are written bare
//! (`210`, not `%32%31%30`), text fields are percent-encoded. The encoding
//! is picked by the tag, so a caller cannot mix conventions within one
//! write.

use std::time::Duration;

use tracing::{debug, warn};

use chromacast_core::{CascadeSnapshot, Hsl};

/// One year; the channel is a mirror, not a session value.
pub const CHANNEL_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Percent encoding
// ---------------------------------------------------------------------------

/// Minimal percent-encoding: unreserved bytes (`A–Z a–z 0–9 - . _ ~`) pass
/// through, everything else becomes `%XX`.
pub fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Inverse of [`percent_encode`]. Returns `None` on truncated or non-hex
/// escapes rather than guessing.
pub fn percent_decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

// ---------------------------------------------------------------------------
// Channel values
// ---------------------------------------------------------------------------

/// A value on the channel, tagged with its encoding convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelValue {
    /// Written bare, no escaping.
    Num(i64),
    /// Percent-encoded on write, decoded on read.
    Text(String),
}

impl ChannelValue {
    /// Wire form of the value.
    pub fn encode(&self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Text(s) => percent_encode(s),
        }
    }

    /// Parse a bare numeric field.
    pub fn decode_num(raw: &str) -> Option<i64> {
        raw.parse().ok()
    }

    /// Decode a percent-encoded text field.
    pub fn decode_text(raw: &str) -> Option<String> {
        percent_decode(raw)
    }
}

// ---------------------------------------------------------------------------
// Cookie jar seam
// ---------------------------------------------------------------------------

/// `SameSite` attribute values a variant may have been written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub const ALL: [SameSite; 3] = [SameSite::Lax, SameSite::Strict, SameSite::None];
}

/// Attributes a cookie entry is stored under. Two entries with the same
/// name but different attributes are distinct cookies, which is the root of
/// the shadowing hazard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CookieAttrs {
    pub path: String,
    pub domain: Option<String>,
    pub same_site: SameSite,
}

impl CookieAttrs {
    /// The single variant the channel writes.
    pub fn canonical() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            same_site: SameSite::Lax,
        }
    }
}

/// Raw pre-render-readable key/value jar. The host backs this with real
/// request cookies; tests and headless hosts use [`MemoryJar`].
pub trait CookieJar {
    /// Insert or overwrite the entry for `(name, attrs)`.
    fn set(&mut self, name: &str, value: &str, attrs: &CookieAttrs, ttl: Duration);

    /// Delete the entry for `(name, attrs)` if present. Absence is not an
    /// error.
    fn remove(&mut self, name: &str, attrs: &CookieAttrs);

    /// Resolve `name` the way a browser would: most specific path first,
    /// oldest entry on ties. This is a *resolution*, not a lookup — a stale
    /// variant can and will shadow a fresher one.
    fn get(&self, name: &str) -> Option<String>;
}

/// In-memory jar that faithfully models variant shadowing.
#[derive(Debug, Default)]
pub struct MemoryJar {
    entries: Vec<JarEntry>,
    next_seq: u64,
}

#[derive(Debug)]
struct JarEntry {
    name: String,
    value: String,
    attrs: CookieAttrs,
    seq: u64,
}

impl MemoryJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries for `name`, across all variants. Exactly one
    /// after a well-formed channel write.
    pub fn variant_count(&self, name: &str) -> usize {
        self.entries.iter().filter(|e| e.name == name).count()
    }
}

impl CookieJar for MemoryJar {
    fn set(&mut self, name: &str, value: &str, attrs: &CookieAttrs, _ttl: Duration) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.name == name && e.attrs == *attrs)
        {
            entry.value = value.to_string();
            return;
        }
        self.entries.push(JarEntry {
            name: name.to_string(),
            value: value.to_string(),
            attrs: attrs.clone(),
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    fn remove(&mut self, name: &str, attrs: &CookieAttrs) {
        self.entries
            .retain(|e| !(e.name == name && e.attrs == *attrs));
    }

    fn get(&self, name: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .max_by(|a, b| {
                a.attrs
                    .path
                    .len()
                    .cmp(&b.attrs.path.len())
                    .then(b.seq.cmp(&a.seq))
            })
            .map(|e| e.value.clone())
    }
}

// ---------------------------------------------------------------------------
// Snapshot field codec (shared with the session mirror)
// ---------------------------------------------------------------------------

const FIELD_SUFFIXES: [&str; 7] = ["h", "s", "l", "hex", "ah", "as", "al"];

/// Flatten a snapshot into `(key, value)` fields under `prefix`. The HSL
/// components are numeric; the redundant primary hex is text (its `#` is
/// what forces the text encoding path to exist at all).
pub(crate) fn snapshot_fields(prefix: &str, snap: &CascadeSnapshot) -> Vec<(String, ChannelValue)> {
    let key = |suffix: &str| format!("{prefix}-{suffix}");
    let mut fields = vec![
        (key("h"), ChannelValue::Num(i64::from(snap.primary.hue()))),
        (
            key("s"),
            ChannelValue::Num(i64::from(snap.primary.saturation())),
        ),
        (
            key("l"),
            ChannelValue::Num(i64::from(snap.primary.lightness())),
        ),
        (
            key("hex"),
            ChannelValue::Text(snap.primary.to_hex().to_string()),
        ),
    ];
    if let Some(accent) = snap.accent {
        fields.push((key("ah"), ChannelValue::Num(i64::from(accent.hue()))));
        fields.push((key("as"), ChannelValue::Num(i64::from(accent.saturation()))));
        fields.push((key("al"), ChannelValue::Num(i64::from(accent.lightness()))));
    }
    fields
}

/// Reassemble a snapshot from a field reader. Any malformed or out-of-range
/// component degrades to `None` (primary) or drops the accent.
pub(crate) fn parse_snapshot(
    prefix: &str,
    read: impl Fn(&str) -> Option<String>,
) -> Option<CascadeSnapshot> {
    let field = |suffix: &str| read(&format!("{prefix}-{suffix}"));
    let num = |suffix: &str| {
        field(suffix)
            .as_deref()
            .and_then(ChannelValue::decode_num)
    };
    let triple = |h: &str, s: &str, l: &str| -> Option<Hsl> {
        let (h, s, l) = (num(h)?, num(s)?, num(l)?);
        let h = u16::try_from(h).ok()?;
        let s = u8::try_from(s).ok()?;
        let l = u8::try_from(l).ok()?;
        Hsl::new(h, s, l).ok()
    };

    let primary = triple("h", "s", "l").or_else(|| {
        // Numeric triple incomplete; the redundant hex field can still
        // rescue the paint.
        let raw = field("hex")?;
        let hex = ChannelValue::decode_text(&raw)?;
        let parsed: chromacast_core::HexColor = hex.parse().ok()?;
        Some(parsed.to_hsl())
    })?;

    Some(CascadeSnapshot::new(primary, triple("ah", "as", "al")))
}

// ---------------------------------------------------------------------------
// Edge cache channel
// ---------------------------------------------------------------------------

/// The typed channel over a [`CookieJar`].
///
/// `variants()` enumerates every attribute combination any historical
/// version of the host may have written under; the sweep in [`write`]
/// deletes all of them before the canonical write.
///
/// [`write`]: EdgeCacheChannel::write
#[derive(Debug, Clone)]
pub struct EdgeCacheChannel {
    prefix: String,
    paths: Vec<String>,
    domains: Vec<String>,
}

impl Default for EdgeCacheChannel {
    fn default() -> Self {
        Self {
            prefix: "chromacast-brand".into(),
            paths: vec!["/".into(), "/admin".into()],
            domains: Vec::new(),
        }
    }
}

impl EdgeCacheChannel {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Register an extra path a legacy write may have used.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Register a domain a legacy write may have been scoped to.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        FIELD_SUFFIXES
            .iter()
            .map(move |suffix| format!("{}-{suffix}", self.prefix))
    }

    fn variants(&self) -> Vec<CookieAttrs> {
        let mut variants = Vec::new();
        for path in &self.paths {
            for domain in std::iter::once(None).chain(self.domains.iter().map(Some)) {
                for same_site in SameSite::ALL {
                    variants.push(CookieAttrs {
                        path: path.clone(),
                        domain: domain.cloned(),
                        same_site,
                    });
                }
            }
        }
        variants
    }

    /// Sweep every known variant of every channel key, then write the
    /// canonical variant. Idempotent; absent keys sweep as no-ops.
    pub fn write(&self, jar: &mut dyn CookieJar, snap: &CascadeSnapshot) {
        let variants = self.variants();
        for key in self.keys() {
            for attrs in &variants {
                jar.remove(&key, attrs);
            }
        }
        let canonical = CookieAttrs::canonical();
        for (key, value) in snapshot_fields(&self.prefix, snap) {
            jar.set(&key, &value.encode(), &canonical, CHANNEL_TTL);
        }
        debug!(prefix = %self.prefix, swept = variants.len(), "edge cache channel rewritten");
    }

    /// Synchronous pre-render read. Any malformed entry degrades to `None`;
    /// the first paint then simply asserts nothing.
    pub fn read_sync(&self, jar: &dyn CookieJar) -> Option<CascadeSnapshot> {
        let snap = parse_snapshot(&self.prefix, |key| jar.get(key));
        if snap.is_none() && jar.get(&format!("{}-h", self.prefix)).is_some() {
            warn!(prefix = %self.prefix, "edge cache channel held a malformed value; ignoring");
        }
        snap
    }
}
