use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Social-preview metadata keys looked up in fetched markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaKey {
    OgTitle,
    OgDescription,
    OgImage,
    OgVideo,
    TwitterTitle,
    TwitterDescription,
}

impl MetaKey {
    pub const ALL: [MetaKey; 6] = [
        MetaKey::OgTitle,
        MetaKey::OgDescription,
        MetaKey::OgImage,
        MetaKey::OgVideo,
        MetaKey::TwitterTitle,
        MetaKey::TwitterDescription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKey::OgTitle => "og:title",
            MetaKey::OgDescription => "og:description",
            MetaKey::OgImage => "og:image",
            MetaKey::OgVideo => "og:video",
            MetaKey::TwitterTitle => "twitter:title",
            MetaKey::TwitterDescription => "twitter:description",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata found in a page. Keys that were not found are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaMap(BTreeMap<MetaKey, String>);

impl MetaMap {
    pub fn get(&self, key: MetaKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: MetaKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetaKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Compact JSON object, e.g. `{"og:title":"Hello"}`.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for MetaMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// Two patterns per key: the key attribute before `content`, and `content` before the key.
struct KeyPatterns {
    key: MetaKey,
    key_first: Regex,
    content_first: Regex,
}

const CONTENT_ATTR: &str = r#"content\s*=\s*(?:"([^"]+)"|'([^']+)')"#;

static PATTERNS: LazyLock<Vec<KeyPatterns>> = LazyLock::new(|| {
    MetaKey::ALL
        .iter()
        .map(|&key| {
            let key_attr = format!(
                r#"(?:property|name)\s*=\s*["']{}["']"#,
                regex::escape(key.as_str())
            );
            let key_first = format!(r"(?is)<meta\s[^>]*?{key_attr}[^>]*?\s{CONTENT_ATTR}");
            let content_first = format!(r"(?is)<meta\s[^>]*?{CONTENT_ATTR}[^>]*?\s{key_attr}");
            KeyPatterns {
                key,
                // Patterns are built from escaped constants.
                key_first: Regex::new(&key_first).expect("valid meta pattern"),
                content_first: Regex::new(&content_first).expect("valid meta pattern"),
            }
        })
        .collect()
});

/// Scan markup for the six social-preview keys. Only the first occurrence of each key is kept.
pub fn extract_meta_tags(html: &str) -> MetaMap {
    let mut meta = BTreeMap::new();

    for patterns in PATTERNS.iter() {
        let first = [&patterns.key_first, &patterns.content_first]
            .into_iter()
            .filter_map(|re| re.captures(html))
            .min_by_key(|caps| caps.get(0).map(|m| m.start()).unwrap_or(usize::MAX));

        let value = first.and_then(|caps| caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string()));
        if let Some(value) = value {
            meta.insert(patterns.key, html_escape::decode_html_entities(&value).into_owned());
        }
    }

    MetaMap(meta)
}
