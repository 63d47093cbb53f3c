use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use modops::models::ManifestDocument;
use modops::services::TokenSet;
use std::hint::black_box;

const CANDIDATE_COUNT: usize = 500;

const MANIFEST: &str = r#"<InstalledMods>
  <mod unique="ColorfulClouds-a1b2c3d4" displayName="Colorful Clouds" name="ColorfulClouds">
    <file game="GalacticAdventures">ColorfulClouds.package</file>
    <file>ColorfulClouds.dll</file>
    <file>mods\clouds\clouds_config.xml</file>
  </mod>
</InstalledMods>"#;

/// A folder listing mixing related, unrelated and base-game names
fn candidates() -> Vec<String> {
    (0..CANDIDATE_COUNT)
        .map(|i| match i % 5 {
            0 => format!("ColorfulClouds-v{}.package", i),
            1 => format!("GalaxyFixer_{}.dll", i),
            2 => "Spore_EP1_Data.package".to_string(),
            3 => format!("clouds-hd-{}.package", i),
            _ => format!("SkyBoxPro{}.dll", i),
        })
        .collect()
}

fn bench_score(c: &mut Criterion) {
    let doc = ManifestDocument::parse(MANIFEST).expect("manifest");
    let tokens = TokenSet::for_entry(doc.entries.first(), "ColorfulClouds");
    let names = candidates();

    c.bench_with_input(BenchmarkId::new("score_folder", CANDIDATE_COUNT), &names, |b, names| {
        b.iter(|| names.iter().filter(|n| tokens.matches(black_box(n))).count());
    });
}

fn bench_token_set(c: &mut Criterion) {
    let doc = ManifestDocument::parse(MANIFEST).expect("manifest");
    c.bench_function("token_set_for_entry", |b| {
        b.iter(|| TokenSet::for_entry(black_box(doc.entries.first()), black_box("ColorfulClouds")));
    });
}

criterion_group!(benches, bench_score, bench_token_set);
criterion_main!(benches);
