use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Trailing description tokens the feed uses to tag a platform ("Super Mario Odyssey NSW").
pub const PLATFORM_SUFFIXES: [&str; 12] = [
    "NSW", "PS4", "PS5", "XBOX", "XBX", "XB1", "XBO", "XB", "PS", "P", "N", "X",
];

/// Consoles recognised in promotion fine print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    PlayStation5,
    PlayStation4,
    XboxSeries,
    XboxOne,
    NintendoSwitch,
}

impl Platform {
    /// Resolve a fine-print token ("PS5", "Playstation 5", "XBox Series X/S", "Switch").
    ///
    /// Matching ignores case and whitespace.
    pub fn from_token(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "ps5" | "playstation5" => Some(Platform::PlayStation5),
            "ps4" | "playstation4" => Some(Platform::PlayStation4),
            "xboxseriesx" | "xboxseriess" | "xboxseriesx/s" | "xboxseriesx|s" => {
                Some(Platform::XboxSeries)
            }
            "xboxone" => Some(Platform::XboxOne),
            "nintendoswitch" | "switch" => Some(Platform::NintendoSwitch),
            _ => None,
        }
    }
}

/// Full platform name to the short code used in catalog links and exclusion checks.
///
/// Unmapped platforms fall back to their raw name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformMap(IndexMap<String, String>);

impl PlatformMap {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn code_for<'a>(&'a self, platform: &'a str) -> &'a str {
        self.0.get(platform).map(String::as_str).unwrap_or(platform)
    }
}

impl Default for PlatformMap {
    fn default() -> Self {
        Self::new([
            ("Nintendo Switch", "Switch"),
            ("Playstation 4", "PS4"),
            ("Playstation 5", "PS5"),
        ])
    }
}

/// Drop one trailing platform token from a feed description, then trim.
pub fn strip_platform_suffix(description: &str) -> String {
    match description.rsplit_once(' ') {
        Some((head, tail)) if PLATFORM_SUFFIXES.contains(&tail) => head.trim().to_string(),
        _ => description.trim().to_string(),
    }
}
