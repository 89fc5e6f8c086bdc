use std::path::PathBuf;

use expect_test::expect;
use sfc_lsp::{
    build_registry, collect_diagnostics, discover_settings, scan_regions, DialectId,
    DocumentSegmenter, DocumentSnapshot, Error, ModeRegistry, RegistrySlot, ResolveContext,
    Settings,
};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Url};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Format diagnostics into a deterministic, human-readable string.
///
/// Each diagnostic becomes one line:
///   <start_line>:<start_col>-<end_line>:<end_col> <severity> (<source>): <message>
fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "OK (no diagnostics)".to_string();
    }

    let mut lines: Vec<String> = diagnostics
        .iter()
        .map(|d| {
            let range = &d.range;
            let severity = match d.severity {
                Some(DiagnosticSeverity::ERROR) => "error",
                Some(DiagnosticSeverity::WARNING) => "warning",
                _ => "other",
            };
            format!(
                "{}:{}-{}:{} {} ({}): {}",
                range.start.line,
                range.start.character,
                range.end.line,
                range.end.character,
                severity,
                d.source.as_deref().unwrap_or("-"),
                d.message,
            )
        })
        .collect();

    lines.sort();
    lines.join("\n")
}

/// One line per region: `<start>..<end> <dialect>[ (attr)] <text>`.
fn format_regions(text: &str) -> String {
    scan_regions(text)
        .all_ranges()
        .iter()
        .map(|r| {
            let attr = if r.attribute_value { " (attr)" } else { "" };
            format!("{}..{} {}{} {:?}", r.start, r.end, r.dialect, attr, &text[r.span()])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn snapshot(name: &str, version: i32, text: &str) -> DocumentSnapshot {
    let uri = Url::parse(&format!("file:///project/src/{name}")).unwrap();
    DocumentSnapshot::new(uri, version, text)
}

async fn default_registry() -> ModeRegistry {
    build_registry(&Settings::default(), None).await.unwrap()
}

async fn check(text: &str) -> String {
    let registry = default_registry().await;
    let diagnostics = collect_diagnostics(&registry, &snapshot("Check.vue", 1, text));
    format_diagnostics(&diagnostics)
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

const SAVE_BUTTON: &str = r#"<template>
  <button :disabled="busy" @click="save">{{ label }}</button>
</template>

<script lang="ts">
export default { name: 'SaveButton' }
</script>

<style lang="scss" scoped>
.btn { color: #336699; }
</style>
"#;

// ---------------------------------------------------------------------------
// Tests: segmentation
// ---------------------------------------------------------------------------

#[test]
fn segments_component_blocks_and_expressions() {
    let actual = format_regions(SAVE_BUTTON);
    let expected = expect![[r#"
        10..32 vue-html "\n  <button :disabled=\""
        32..36 typescript (attr) "busy"
        36..46 vue-html "\" @click=\""
        46..50 typescript (attr) "save"
        50..54 vue-html "\">{{"
        54..61 typescript (attr) " label "
        61..73 vue-html "}}</button>\n"
        104..143 typescript "\nexport default { name: 'SaveButton' }\n"
        180..206 scss "\n.btn { color: #336699; }\n""#]];
    expected.assert_eq(&actual);
}

#[test]
fn segments_comments_and_custom_blocks_away() {
    let text = "<!-- <script>nope</script> -->\n<i18n>{}</i18n>\n<style lang=\"stylus\">a\n  b c</style>";
    let actual = format_regions(text);
    let expected = expect![[r#"68..75 stylus "a\n  b c""#]];
    expected.assert_eq(&actual);
}

#[test]
fn region_boundaries_follow_latest_version() {
    let v1 = "<template><p/></template>\n<script>\nlet a = 1\n</script>\n<style>.x {}</style>";
    let v2 = "<template><p/></template>\n<script>\nlet a = 1; let bb = 22\n</script>\n<style>.x {}</style>";
    let segmenter = DocumentSegmenter::default();

    let probe = v1.find("</script>").unwrap() + 4;
    let first = segmenter.segment(&snapshot("A.vue", 1, v1)).unwrap();
    assert_eq!(first.dialect_at(probe), DialectId::VueHtml);
    assert_eq!(first.dialect_at(v1.find("let").unwrap()), DialectId::JavaScript);
    assert_eq!(first.dialect_at(v1.find(".x").unwrap()), DialectId::Css);
    assert_eq!(first.dialect_at(2), DialectId::VueHtml);

    let edited = snapshot("A.vue", 2, v2);
    let second = segmenter.segment(&edited).unwrap();
    assert_eq!(second.dialect_at(probe), DialectId::JavaScript);
    assert_eq!(segmenter.cache().cached_version(&edited.uri), Some(2));
}

// ---------------------------------------------------------------------------
// Tests: diagnostics across regions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_component() {
    let actual = check(SAVE_BUTTON).await;
    let expected = expect![[r#"OK (no diagnostics)"#]];
    expected.assert_eq(&actual);
}

#[tokio::test]
async fn errors_in_every_region() {
    let text = "<template>\n  <p>{{ count </p>\n</template>\n<script>\nconst total = sum(1, 2\n</script>\n<style>\n.a { color: red;\n</style>\n";
    let actual = check(text).await;
    let expected = expect![[r#"
        1:5-1:7 error (vue-html): Interpolation is missing its closing `}}`
        4:17-4:18 error (script): Unclosed `(`
        7:3-7:4 error (css): Unclosed `{`"#]];
    expected.assert_eq(&actual);
}

#[tokio::test]
async fn shared_script_mode_reports_once_per_document() {
    // Two script regions share one mode; its diagnostics must not repeat.
    let text = "<template><a :x=\"f(\"></a></template>\n<script>\nfoo]\n</script>\n";
    let actual = check(text).await;
    let expected = expect![[r#"
        0:18-0:19 error (script): Unclosed `(`
        2:3-2:4 error (script): Unmatched `]`"#]];
    expected.assert_eq(&actual);
}

#[tokio::test]
async fn unknown_lang_is_ignored() {
    let text = "<style lang=\"unknown\">{{{</style>\n<template><p>ok</p></template>";
    let actual = check(text).await;
    let expected = expect![[r#"OK (no diagnostics)"#]];
    expected.assert_eq(&actual);
}

// ---------------------------------------------------------------------------
// Tests: registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disabled_dialects_drop_out_of_dispatch() {
    let settings: Settings = toml::from_str("[dialects]\ndisabled = [\"scss\"]\n").unwrap();
    let registry = build_registry(&settings, None).await.unwrap();

    assert!(registry.lookup(DialectId::Scss).is_none());
    let doc = snapshot("SaveButton.vue", 1, SAVE_BUTTON);
    let dialects: Vec<_> = registry
        .all_regions_with_modes(&doc)
        .unwrap()
        .into_iter()
        .map(|(range, _)| range.dialect)
        .collect();
    assert!(!dialects.contains(&DialectId::Scss));
    assert_eq!(dialects.len(), 8);
}

#[tokio::test]
async fn script_dialects_share_one_mode() {
    let registry = default_registry().await;
    let js = registry.lookup(DialectId::JavaScript).unwrap();
    let tsx = registry.lookup(DialectId::Tsx).unwrap();
    assert!(std::ptr::addr_eq(
        std::sync::Arc::as_ptr(&js),
        std::sync::Arc::as_ptr(&tsx)
    ));
    // template, six stylesheet dialects, scripts
    assert_eq!(registry.all_modes().len(), 8);
    assert!(registry.lookup(DialectId::Pug).is_none());
}

#[tokio::test]
async fn slot_gates_requests_until_ready() {
    let slot = RegistrySlot::new();
    assert!(matches!(slot.get(), Err(Error::NotReady)));

    slot.begin_initializing();
    slot.set_ready(default_registry().await);
    let registry = slot.ready().await.unwrap();

    let doc = snapshot("SaveButton.vue", 1, SAVE_BUTTON);
    let offset = SAVE_BUTTON.find(".btn").unwrap();
    let mode = registry.mode_at(&doc, offset).unwrap().unwrap();
    assert_eq!(mode.id(), DialectId::Scss);

    slot.shutdown();
    assert!(matches!(slot.get(), Err(Error::Disposed)));
    assert!(registry.mode_at(&doc, offset).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Tests: fixture workspace
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fixture_workspace_settings_and_project_aliases() {
    let root = fixture("workspace");
    let (settings, settings_dir) = discover_settings(&root.join("src"));
    assert_eq!(settings_dir, root);
    assert_eq!(settings.cache.capacity, 32);

    let registry = build_registry(&settings, Some(root.clone())).await.unwrap();
    assert!(registry.lookup(DialectId::Less).is_none());

    let path = root.join("src/App.vue");
    let text = std::fs::read_to_string(&path).unwrap();
    let doc = DocumentSnapshot::new(Url::from_file_path(&path).unwrap(), 1, text);

    // The unclosed `{` sits in a less block, which is disabled.
    let actual = format_diagnostics(&collect_diagnostics(&registry, &doc));
    let expected = expect![[r#"OK (no diagnostics)"#]];
    expected.assert_eq(&actual);

    let script = registry.lookup(DialectId::TypeScript).unwrap();
    let context = ResolveContext::new(doc.uri.clone(), Some(root.clone()));
    let targets: Vec<_> = script
        .document_links(&doc, &context)
        .unwrap()
        .into_iter()
        .filter_map(|link| link.target)
        .collect();
    assert_eq!(
        targets,
        vec![Url::from_file_path(root.join("src/components/Card.vue")).unwrap()]
    );
}

#[tokio::test]
async fn fixture_components_are_clean() {
    let root = fixture("workspace");
    let (settings, _) = discover_settings(&root);
    let registry = build_registry(&settings, Some(root.clone())).await.unwrap();

    let path = root.join("src/components/Card.vue");
    let text = std::fs::read_to_string(&path).unwrap();
    let doc = DocumentSnapshot::new(Url::from_file_path(&path).unwrap(), 1, text);

    let actual = format_diagnostics(&collect_diagnostics(&registry, &doc));
    let expected = expect![[r#"OK (no diagnostics)"#]];
    expected.assert_eq(&actual);
}

#[tokio::test]
async fn client_configuration_layers_over_settings_file() {
    let root = fixture("workspace");
    let (file_settings, _) = discover_settings(&root);
    let registry = build_registry(&file_settings, Some(root)).await.unwrap();
    let doc = snapshot("Broken.vue", 1, "<style>\n.a { color: red;\n</style>");
    let diagnostics = || format_diagnostics(&collect_diagnostics(&registry, &doc));

    expect![[r#"OK (no diagnostics)"#]].assert_eq(&diagnostics());

    // Another tool's section leaves the file settings alone.
    let unrelated = serde_json::json!({ "editor": { "tabSize": 2 } });
    assert!(file_settings.with_overrides(unrelated).unwrap().is_none());

    let template_only = serde_json::json!({ "sfc": { "template": { "validate": false } } });
    let merged = file_settings.with_overrides(template_only).unwrap().unwrap();
    registry.configure(&merged);
    expect![[r#"OK (no diagnostics)"#]].assert_eq(&diagnostics());

    let style_on = serde_json::json!({ "sfc": { "style": { "validate": true } } });
    let merged = file_settings.with_overrides(style_on).unwrap().unwrap();
    registry.configure(&merged);
    expect![[r#"1:3-1:4 error (css): Unclosed `{`"#]].assert_eq(&diagnostics());
}
