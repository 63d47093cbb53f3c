//! Name normalization and the relatedness scorer used when uninstalling mods
//! that have no artifact record.
//!
//! Everything here is pure. The scorer works on two derived views of a name:
//!
//! - **dash segments**: `normalize_dll_token` splits into lowercase alphanumeric runs
//!   (`"Some!Mod-Name-abc123.dll"` → `some`, `mod`, `name`, `abc123`)
//! - **alpha tokens**: letters-only words with camel-case split and generic game
//!   words removed (`"ColorfulClouds_v2.package"` → `colorful`, `clouds`)
//!
//! A candidate matches when, in order:
//!
//! 1. it contains a base identity's joined segments as a substring, or
//! 2. it shares at least `min_overlap` dash segments with one base identity, where
//!    `min_overlap` drops from 2 to 1 once a long (≥5 letter) alpha token or two
//!    shorter ones are shared.
//!
//! Names containing a base-game package pattern never match.

use crate::models::ManifestEntry;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Generic words that say nothing about which mod a file belongs to
const STOPWORDS: &[&str] = &[
    "spore",
    "ep1",
    "ga",
    "galactic",
    "adventures",
    "data",
    "content",
    "locale",
    "patch",
];

/// Substrings of the game's own package names
const BASE_GAME_PATTERNS: &[&str] = &[
    "spore_ep1_content",
    "spore_ep1_data",
    "spore_ep1_locale",
    "spore_ep1_patch",
    "spore_content",
    "spore_data",
    "spore_locale",
    "spore_patch",
    "spore_graphics",
    "spore_game",
    "ep1_patch",
    "ep1_data",
    "ep1_locale",
];

const DEFAULT_MIN_OVERLAP: usize = 2;
const LONG_ALPHA_TOKEN: usize = 5;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));
static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));
static KNOWN_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(dll|package|xml|txt|ini)$").expect("static regex"));
static DLL_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.dll$").expect("static regex"));
static HASH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-[0-9a-f]{6,}$").expect("static regex"));

fn strip_dir(name: &str) -> &str {
    name.rsplit(['\\', '/']).next().unwrap_or(name)
}

/// Normalize a file or identity name into a dash-joined lowercase token.
///
/// Strips any directory and a `.dll` suffix, lowercases, maps `!` to `-`,
/// collapses non-alphanumeric runs to one `-` and trims dashes at both ends.
pub fn normalize_dll_token(name: &str) -> String {
    let base = DLL_EXTENSION.replace(strip_dir(name), "");
    let lower = base.trim().to_lowercase().replace('!', "-");
    NON_ALNUM
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

fn segments_of(token: &str) -> Vec<String> {
    token
        .split('-')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Letters-only word tokens of one name, lowercased, deduplicated in order
pub fn alpha_tokens_of(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    push_alpha_tokens(name, &mut out);
    out
}

fn push_alpha_tokens(name: &str, out: &mut Vec<String>) {
    let base = KNOWN_EXTENSION.replace(strip_dir(name), "");
    let split = CAMEL_BOUNDARY.replace_all(&base, "$1 $2").to_lowercase();

    for part in NON_ALNUM.split(&split).filter(|p| !p.is_empty()) {
        let letters: String = part.chars().filter(|c| c.is_ascii_lowercase()).collect();
        if letters.len() >= 2 && !STOPWORDS.contains(&letters.as_str()) && !out.contains(&letters)
        {
            out.push(letters);
        }
    }
}

/// True if the name contains one of the game's own package patterns
pub fn is_base_game_package(name: &str) -> bool {
    let lower = name.to_lowercase();
    BASE_GAME_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Identity tokens of a manifest entry and/or mod key.
///
/// Sources are the mod key, `unique`, `displayName` and `name`; a trailing
/// `-<hex hash>` is removed before normalization. Duplicates and empties dropped.
pub fn entry_tokens(entry: Option<&ManifestEntry>, mod_key: &str) -> Vec<String> {
    let sources = std::iter::once(mod_key).chain(entry.into_iter().flat_map(|e| e.identities()));

    let mut tokens: Vec<String> = Vec::new();
    for source in sources {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            continue;
        }
        let token = normalize_dll_token(&HASH_SUFFIX.replace(trimmed, ""));
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Number of `candidate` segments present in `base`
pub fn segments_overlap(base: &[String], candidate: &[String]) -> usize {
    let set: HashSet<&str> = base.iter().map(String::as_str).collect();
    candidate.iter().filter(|s| set.contains(s.as_str())).count()
}

/// Outcome of scoring one candidate name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchVerdict {
    /// Base-game package; never deleted
    Denylisted,
    /// Candidate contains a base identity's joined segments
    Substring,
    /// Candidate shares this many segments with one base identity
    SegmentOverlap(usize),
    NoMatch,
}

impl MatchVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchVerdict::Substring | MatchVerdict::SegmentOverlap(_))
    }
}

/// Dash segments and alpha tokens derived from a mod's identity strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    segments: Vec<Vec<String>>,
    alpha: Vec<String>,
}

impl TokenSet {
    pub fn from_strings<'a>(strings: impl IntoIterator<Item = &'a str>) -> Self {
        let mut segments: Vec<Vec<String>> = Vec::new();
        let mut alpha = Vec::new();

        for s in strings {
            let segs = segments_of(&normalize_dll_token(s));
            if !segs.is_empty() && !segments.contains(&segs) {
                segments.push(segs);
            }
            push_alpha_tokens(s, &mut alpha);
        }

        Self { segments, alpha }
    }

    /// Tokens for the heuristic pass: entry identities plus declared file paths
    pub fn for_entry(entry: Option<&ManifestEntry>, mod_key: &str) -> Self {
        let mut sources = entry_tokens(entry, mod_key);
        if let Some(entry) = entry {
            for file in &entry.files {
                if !sources.contains(&file.path) {
                    sources.push(file.path.clone());
                }
            }
        }
        Self::from_strings(sources.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Vec<String>] {
        &self.segments
    }

    pub fn alpha(&self) -> &[String] {
        &self.alpha
    }

    /// Dash-segment overlap required for this candidate
    fn min_overlap(&self, file_name: &str) -> usize {
        let file_alpha = alpha_tokens_of(file_name);
        let shared: Vec<&String> = self.alpha.iter().filter(|t| file_alpha.contains(t)).collect();

        if shared.iter().any(|t| t.len() >= LONG_ALPHA_TOKEN) || shared.len() >= 2 {
            1
        } else {
            DEFAULT_MIN_OVERLAP
        }
    }

    /// Shared alpha words only lower the segment threshold. They never match a file
    /// on their own, so `CloudsHD.package` is not related to `ColorfulClouds`.
    pub fn score(&self, file_name: &str) -> MatchVerdict {
        if is_base_game_package(file_name) {
            return MatchVerdict::Denylisted;
        }

        let token = normalize_dll_token(file_name);
        if token.is_empty() || self.segments.is_empty() {
            return MatchVerdict::NoMatch;
        }
        let candidate = segments_of(&token);
        let joined = candidate.concat();

        for base in &self.segments {
            let base_joined = base.concat();
            if !base_joined.is_empty()
                && (token.contains(&base_joined) || joined.contains(&base_joined))
            {
                return MatchVerdict::Substring;
            }
        }

        let min_overlap = self.min_overlap(file_name);
        if candidate.len() < min_overlap {
            return MatchVerdict::NoMatch;
        }

        self.segments
            .iter()
            .map(|base| segments_overlap(base, &candidate))
            .filter(|&n| n >= min_overlap)
            .max()
            .map_or(MatchVerdict::NoMatch, MatchVerdict::SegmentOverlap)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.score(file_name).is_match()
    }
}

/// True when the name's token contains any of the identity tokens
pub fn token_contains_any(file_name: &str, tokens: &[String]) -> bool {
    let token = normalize_dll_token(file_name);
    !token.is_empty() && tokens.iter().any(|t| !t.is_empty() && token.contains(t.as_str()))
}

/// True when the name has ≥2 segments and shares ≥2 with one identity token
pub fn shares_two_segments(file_name: &str, tokens: &[String]) -> bool {
    let candidate = segments_of(&normalize_dll_token(file_name));
    if candidate.len() < 2 {
        return false;
    }
    tokens
        .iter()
        .any(|t| segments_overlap(&segments_of(t), &candidate) >= 2)
}
