//! In-memory form of the external tool's `InstalledMods.config`.
//!
//! The file is owned by the external installer. Entries look like:
//!
//! ```xml
//! <InstalledMods>
//!   <mod unique="ColorfulClouds" displayName="Colorful Clouds" configurator="ModConfigs\ColorfulClouds\config.xml">
//!     <file game="GalacticAdventures">ColorfulClouds.package</file>
//!     <file>ColorfulClouds.dll</file>
//!   </mod>
//! </InstalledMods>
//! ```
//!
//! Identity fields may also appear as simple child elements. Every attribute and
//! simple child element survives a parse/serialize round trip, so removing one
//! entry never drops data the external tool wrote for the others.

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

pub const MANIFEST_ROOT: &str = "InstalledMods";
const MOD_ELEMENT: &str = "mod";
const FILE_ELEMENT: &str = "file";

/// The empty manifest the external installer accepts
pub const EMPTY_MANIFEST: &str = "<InstalledMods></InstalledMods>";

/// One declared file of a registered mod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: String,
    pub attributes: IndexMap<String, String>,
}

impl ManifestFile {
    pub fn new(path: &str, game: Option<&str>) -> Self {
        let mut attributes = IndexMap::new();
        if let Some(game) = game {
            attributes.insert("game".to_string(), game.to_string());
        }
        Self {
            path: path.to_string(),
            attributes,
        }
    }

    /// Target game-data area, when tagged
    pub fn game(&self) -> Option<&str> {
        self.attributes
            .get("game")
            .map(String::as_str)
            .filter(|g| !g.trim().is_empty())
    }

    /// Lowercased file name without any directory part
    pub fn file_name_lower(&self) -> String {
        self.path
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

/// A record describing one currently-registered mod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    pub attributes: IndexMap<String, String>,
    /// Simple `<key>text</key>` children other than `file`
    pub elements: IndexMap<String, String>,
    pub files: Vec<ManifestFile>,
}

impl ManifestEntry {
    fn field(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .or_else(|| self.elements.get(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn unique(&self) -> Option<&str> {
        self.field("unique")
    }

    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.field("displayName")
    }

    /// Path hint to the mod's settings folder, e.g. `ModConfigs\Foo\config.xml`
    pub fn configurator(&self) -> Option<&str> {
        self.field("configurator")
    }

    /// Identity strings in the order they are used for matching
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        [self.unique(), self.display_name(), self.name()]
            .into_iter()
            .flatten()
    }

    fn matches_exactly(&self, key_lower: &str) -> bool {
        [self.unique(), self.name(), self.display_name()]
            .into_iter()
            .flatten()
            .any(|v| v.to_lowercase() == key_lower)
    }
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDocument {
    pub root_attributes: IndexMap<String, String>,
    pub entries: Vec<ManifestEntry>,
}

impl ManifestDocument {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry whose `unique`, `name` or `displayName` equals the key
    pub fn find_exact(&self, mod_key: &str) -> Option<usize> {
        let key_lower = mod_key.trim().to_lowercase();
        if key_lower.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .position(|entry| entry.matches_exactly(&key_lower))
    }

    /// Flexible lookup: exact identity, then `name` prefixed by `<key>-`, then any
    /// declared file name containing the key. First hit wins.
    pub fn find_flexible(&self, mod_key: &str) -> Option<usize> {
        let key_lower = mod_key.trim().to_lowercase();
        if key_lower.is_empty() {
            return None;
        }

        if let Some(index) = self.find_exact(&key_lower) {
            return Some(index);
        }

        let prefix = format!("{}-", key_lower);
        if let Some(index) = self.entries.iter().position(|entry| {
            entry
                .name()
                .is_some_and(|name| name.to_lowercase().starts_with(&prefix))
        }) {
            return Some(index);
        }

        self.entries.iter().position(|entry| {
            entry.files.iter().any(|file| {
                let name = file.file_name_lower();
                !name.is_empty() && name.contains(&key_lower)
            })
        })
    }

    pub fn entry_for(&self, mod_key: &str) -> Option<&ManifestEntry> {
        self.find_flexible(mod_key).map(|i| &self.entries[i])
    }

    pub fn remove(&mut self, index: usize) -> ManifestEntry {
        self.entries.remove(index)
    }

    /// Parse manifest XML. Empty input is an empty manifest; a different root
    /// element yields no entries.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut doc = ManifestDocument::default();
        let mut stack: Vec<String> = Vec::new();
        let mut in_manifest = false;
        let mut entry: Option<ManifestEntry> = None;
        let mut child: Option<(String, IndexMap<String, String>, String)> = None;

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("Invalid XML at byte {}", reader.buffer_position()))?;

            match event {
                Event::Start(e) => {
                    let name = element_name(&e);
                    let attrs = collect_attributes(&e)?;
                    on_open(&mut doc, &stack, &mut in_manifest, &mut entry, &mut child, &name, attrs);
                    stack.push(name);
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    let attrs = collect_attributes(&e)?;
                    on_open(&mut doc, &stack, &mut in_manifest, &mut entry, &mut child, &name, attrs);
                    on_close(&mut doc, &stack, &mut entry, &mut child, &name);
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    stack.pop();
                    on_close(&mut doc, &stack, &mut entry, &mut child, &name);
                }
                Event::Text(t) => {
                    if let Some((_, _, text)) = child.as_mut() {
                        text.push_str(&t.unescape().context("Invalid text escape")?);
                    }
                }
                Event::CData(c) => {
                    if let Some((_, _, text)) = child.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            bail!("Unclosed element <{}>", stack.last().map(String::as_str).unwrap_or_default());
        }

        Ok(doc)
    }

    /// Serialize back to the external format
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .context("write declaration")?;

        let mut root = BytesStart::new(MANIFEST_ROOT);
        for (k, v) in &self.root_attributes {
            root.push_attribute((k.as_str(), v.as_str()));
        }
        writer.write_event(Event::Start(root)).context("write root")?;

        for entry in &self.entries {
            let mut start = BytesStart::new(MOD_ELEMENT);
            for (k, v) in &entry.attributes {
                start.push_attribute((k.as_str(), v.as_str()));
            }

            if entry.elements.is_empty() && entry.files.is_empty() {
                writer.write_event(Event::Empty(start)).context("write mod")?;
                continue;
            }

            writer.write_event(Event::Start(start)).context("write mod")?;
            for (k, v) in &entry.elements {
                write_text_element(&mut writer, k, &IndexMap::new(), v)?;
            }
            for file in &entry.files {
                write_text_element(&mut writer, FILE_ELEMENT, &file.attributes, &file.path)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(MOD_ELEMENT)))
                .context("close mod")?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(MANIFEST_ROOT)))
            .context("close root")?;

        let mut xml = String::from_utf8(writer.into_inner()).context("manifest is not UTF-8")?;
        xml.push('\n');
        Ok(xml)
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn collect_attributes(e: &BytesStart<'_>) -> Result<IndexMap<String, String>> {
    let mut out = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr.context("Invalid attribute")?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().context("Invalid attribute value")?;
        out.insert(key, value.trim().to_string());
    }
    Ok(out)
}

fn on_open(
    doc: &mut ManifestDocument,
    stack: &[String],
    in_manifest: &mut bool,
    entry: &mut Option<ManifestEntry>,
    child: &mut Option<(String, IndexMap<String, String>, String)>,
    name: &str,
    attrs: IndexMap<String, String>,
) {
    match stack.len() {
        0 => {
            *in_manifest = name == MANIFEST_ROOT;
            if *in_manifest {
                doc.root_attributes = attrs;
            }
        }
        1 if *in_manifest && name == MOD_ELEMENT => {
            *entry = Some(ManifestEntry {
                attributes: attrs,
                ..ManifestEntry::default()
            });
        }
        2 if entry.is_some() => {
            *child = Some((name.to_string(), attrs, String::new()));
        }
        _ => {}
    }
}

fn on_close(
    doc: &mut ManifestDocument,
    stack: &[String],
    entry: &mut Option<ManifestEntry>,
    child: &mut Option<(String, IndexMap<String, String>, String)>,
    name: &str,
) {
    match stack.len() {
        1 if name == MOD_ELEMENT => {
            if let Some(done) = entry.take() {
                doc.entries.push(done);
            }
        }
        2 => {
            let (Some(current), Some((child_name, attrs, text))) = (entry.as_mut(), child.take())
            else {
                return;
            };
            let text = text.trim().to_string();
            if child_name == FILE_ELEMENT {
                if !text.is_empty() {
                    current.files.push(ManifestFile {
                        path: text,
                        attributes: attrs,
                    });
                }
            } else {
                current.elements.insert(child_name, text);
            }
        }
        _ => {}
    }
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    attributes: &IndexMap<String, String>,
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for (k, v) in attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    writer
        .write_event(Event::Start(start))
        .with_context(|| format!("write <{}>", name))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("write <{}> text", name))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("close <{}>", name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<InstalledMods>
  <mod unique="ColorfulClouds" displayName="Colorful Clouds" name="ColorfulClouds" configurator="ModConfigs\ColorfulClouds\config.xml" hasCustomInstaller="false">
    <file game="GalacticAdventures">ColorfulClouds.package</file>
    <file>ColorfulClouds.dll</file>
  </mod>
  <mod unique="SporeModderFX-Tweaks-a1b2c3d4" name="SporeModderFX-Tweaks-a1b2c3d4">
    <file>mods\tweaks\Tweaks.xml</file>
  </mod>
  <mod>
    <unique>GalaxyFixer</unique>
    <file game="Spore">galaxy_fixer_v3.package</file>
  </mod>
</InstalledMods>
"#;

    #[test]
    fn test_parse_entries_and_files() {
        let doc = ManifestDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.entries.len(), 3);

        let clouds = &doc.entries[0];
        assert_eq!(clouds.unique(), Some("ColorfulClouds"));
        assert_eq!(clouds.display_name(), Some("Colorful Clouds"));
        assert_eq!(clouds.configurator(), Some(r"ModConfigs\ColorfulClouds\config.xml"));
        assert_eq!(clouds.files.len(), 2);
        assert_eq!(clouds.files[0].game(), Some("GalacticAdventures"));
        assert_eq!(clouds.files[1].game(), None);

        assert_eq!(doc.entries[2].unique(), Some("GalaxyFixer"));
    }

    #[test]
    fn test_find_flexible_priority() {
        let doc = ManifestDocument::parse(SAMPLE).unwrap();

        assert_eq!(doc.find_flexible("colorfulclouds"), Some(0));
        assert_eq!(doc.find_flexible("Colorful Clouds"), Some(0));
        // name prefix
        assert_eq!(doc.find_flexible("SporeModderFX"), Some(1));
        // file token
        assert_eq!(doc.find_flexible("galaxy_fixer"), Some(2));
        assert_eq!(doc.find_flexible("NotInstalled"), None);
        assert_eq!(doc.find_flexible("  "), None);
    }

    #[test]
    fn test_round_trip_preserves_unknown_attributes() {
        let doc = ManifestDocument::parse(SAMPLE).unwrap();
        let xml = doc.to_xml().unwrap();
        let reparsed = ManifestDocument::parse(&xml).unwrap();

        assert_eq!(reparsed, doc);
        assert!(xml.contains("hasCustomInstaller=\"false\""));
        assert!(xml.contains("<unique>GalaxyFixer</unique>"));
    }

    #[test]
    fn test_remove_last_entry_leaves_empty_root() {
        let mut doc = ManifestDocument::parse(EMPTY_MANIFEST).unwrap();
        assert!(doc.is_empty());

        doc.entries.push(ManifestEntry {
            attributes: IndexMap::from([("unique".to_string(), "x".to_string())]),
            ..ManifestEntry::default()
        });
        doc.remove(0);

        let xml = doc.to_xml().unwrap();
        assert!(!xml.contains("<mod"));
        assert!(ManifestDocument::parse(&xml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(ManifestDocument::parse("<InstalledMods><mod></InstalledMods>").is_err());
        assert!(ManifestDocument::parse("<InstalledMods><mod unique=\"a\">").is_err());
    }

    #[test]
    fn test_empty_and_foreign_root() {
        assert!(ManifestDocument::parse("").unwrap().is_empty());
        assert!(ManifestDocument::parse("<Other><mod unique=\"a\"/></Other>").unwrap().is_empty());
    }

    #[test]
    fn test_escaped_values_round_trip() {
        let mut doc = ManifestDocument::default();
        doc.entries.push(ManifestEntry {
            attributes: IndexMap::from([("displayName".to_string(), "Fish & Chips <2>".to_string())]),
            elements: IndexMap::new(),
            files: vec![ManifestFile::new("a&b.package", Some("Spore"))],
        });
        let reparsed = ManifestDocument::parse(&doc.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed.entries[0].display_name(), Some("Fish & Chips <2>"));
        assert_eq!(reparsed.entries[0].files[0].path, "a&b.package");
    }
}
