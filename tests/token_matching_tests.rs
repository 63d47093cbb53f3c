//! Integration tests for the uninstall heuristic
//!
//! These tests pin the documented matching examples through the public API.

use modops::models::ManifestDocument;
use modops::services::tokens::{MatchVerdict, TokenSet, entry_tokens, normalize_dll_token};

#[test]
fn test_normalize_examples() {
    assert_eq!(normalize_dll_token("Some!Mod-Name-abc123.dll"), "some-mod-name-abc123");
    assert_eq!(normalize_dll_token(r"mLibs\Colorful_Clouds.DLL"), "colorful-clouds");
    assert_eq!(normalize_dll_token("--!!--"), "");
}

#[test]
fn test_hash_suffix_is_stripped_from_identities() {
    let doc = ManifestDocument::parse(
        r#"<InstalledMods><mod unique="SporeFixes-9f8e7d6c" displayName="Spore Fixes"></mod></InstalledMods>"#,
    )
    .unwrap();

    let tokens = entry_tokens(doc.entries.first(), "SporeFixes");
    assert_eq!(tokens, vec!["sporefixes", "spore-fixes"]);
}

#[test]
fn test_mod_key_matches_versioned_package() {
    let tokens = TokenSet::for_entry(None, "ColorfulClouds");

    assert_eq!(tokens.score("colorfulclouds-v2.package"), MatchVerdict::Substring);
    assert!(tokens.matches("ColorfulClouds.dll"));
    assert!(!tokens.matches("GalaxyFixer.dll"));
}

#[test]
fn test_base_game_packages_are_denylisted() {
    let tokens = TokenSet::from_strings(["spore_ep1_patch", "ColorfulClouds"]);

    assert_eq!(tokens.score("spore_ep1_patch.package"), MatchVerdict::Denylisted);
    assert_eq!(tokens.score("Spore_EP1_Data.package"), MatchVerdict::Denylisted);
}

#[test]
fn test_long_shared_word_relaxes_overlap() {
    // "clouds" (6 letters) is shared, so one common segment is enough
    let tokens = TokenSet::from_strings(["Colorful Clouds"]);
    assert_eq!(tokens.score("clouds-hd.package"), MatchVerdict::SegmentOverlap(1));

    // A short shared word is not
    let tokens = TokenSet::from_strings(["Sky Box Pro"]);
    assert_eq!(tokens.score("box-other.package"), MatchVerdict::NoMatch);
}

#[test]
fn test_shared_alpha_word_alone_is_not_a_match() {
    let tokens = TokenSet::from_strings(["ColorfulClouds"]);

    // "clouds" is shared, but no dash segment is
    assert_eq!(tokens.score("CloudsHD.package"), MatchVerdict::NoMatch);
    assert_eq!(tokens.score("colorful-clouds.package"), MatchVerdict::Substring);
}
