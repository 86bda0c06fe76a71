use std::fs;
use std::path::PathBuf;

use precss_core::config::{Direction, LogicalOptions};
use precss_core::{Options, Processor};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn build(source: &str, options: Options) -> String {
    Processor::new(options)
        .process(source, None)
        .expect("process")
        .css
}

#[test]
fn every_stage_contributes() {
    let options = Options {
        logical: LogicalOptions {
            dir: Some(Direction::Ltr),
            preserve: false,
        },
        ..Options::default()
    };
    let source = r#"
$gap: 4px;
@mixin hover { &:hover { @content; } }
.card {
  width: 10px;
  height: @width;
  color: color-mod(red blackness(50%));
  margin-inline-start: $gap;
  @include hover { color: blue; }
  @media print { display: none; }
}
"#;
    assert_eq!(
        build(source, options),
        ".card {\n    width: 10px;\n    height: 10px;\n    color: rgb(128, 0, 0);\n    margin-left: 4px;\n}\n\n.card:hover {\n    color: blue;\n}\n\n@media print {\n    .card {\n        display: none;\n    }\n}\n\n"
    );
}

#[test]
fn direction_rules_are_flattened() {
    assert_eq!(
        build(".a { text-align: start }", Options::default()),
        ".a:dir(ltr) {\n    text-align: left;\n}\n\n.a:dir(rtl) {\n    text-align: right;\n}\n\n"
    );
}

#[test]
fn extend_and_at_root_run_before_nesting() {
    let source = "%muted { color: gray }\n.note { @extend %muted; .icon { @at-root .badge { margin: 0 } } }";
    assert_eq!(
        build(source, Options::default()),
        ".note {\n    color: gray;\n}\n\n.note .icon {\n}\n\n.badge {\n    margin: 0;\n}\n\n"
    );
}

#[test]
fn warnings_are_collected_per_plugin() {
    let output = Processor::default()
        .process(".a { color: @nope }", None)
        .expect("process");
    assert_eq!(output.css, ".a {\n    color: ;\n}\n\n");
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].plugin, "property-lookup");
}

#[test]
fn fixture_import_tree() {
    let output = Processor::default()
        .process_file(&fixture("imports/main.scss"))
        .expect("process");
    assert_eq!(
        output.css,
        ".partial {\n    color: green;\n}\n\n@media print {\n    .inner {\n        padding: 1px;\n    }\n}\n\n@import \"https://fonts.example.com/font.css\";\n\n.main {\n    color: green;\n}\n\n"
    );
    let files: Vec<String> = output
        .dependencies
        .iter()
        .filter_map(|dependency| dependency.file.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    assert_eq!(files, vec!["_partial.scss", "_inner.scss"]);
}

#[test]
fn imports_from_a_throwaway_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("theme")).expect("mkdir");
    fs::write(dir.path().join("theme/_vars.scss"), "$brand: #000;").expect("write");
    let entry = dir.path().join("entry.scss");
    fs::write(&entry, "@import \"theme/vars\";\na { color: color-mod($brand a(50%)) }").expect("write");

    let output = Processor::default().process_file(&entry).expect("process");
    assert_eq!(output.css, "a {\n    color: rgba(0, 0, 0, 0.5);\n}\n\n");
    assert_eq!(output.dependencies.len(), 1);
    assert!(output.dependencies[0].file.ends_with("theme/_vars.scss"));
}
