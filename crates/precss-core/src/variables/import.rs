use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Node, NodeId, Stylesheet};
use crate::error::Error;
use crate::list;
use crate::loader::{Resolution, ResolvedImport};
use crate::parser;
use crate::pipeline::Dependency;

use super::Walker;

static WRAPPING_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^url\(([\s\S]*)\)$").expect("valid url regex"));
static WRAPPING_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(?:"([\s\S]*)"|'([\s\S]*)')$"#).expect("valid quotes regex"));

/// Strip a wrapping `url()` and then wrapping quotes.
fn trim_wrapping_url(id: &str) -> String {
    let id = WRAPPING_URL.replace(id, "$1");
    WRAPPING_QUOTES.replace(&id, "$1$2").into_owned()
}

impl Walker<'_> {
    /// `@import ID [MEDIA]` inlines the resolved file.
    pub(super) fn transform_import(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        params: &str,
    ) -> Result<bool, Error> {
        let parts = list::space(params);
        let Some(raw_id) = parts.first() else {
            return Ok(false);
        };
        let media = parts[1..].join(" ");
        let import_id = self.interpolate(sheet, id, &trim_wrapping_url(raw_id))?;

        if !self.plugin.import_filter.accepts(&import_id, &media) {
            tracing::debug!(id = %import_id, "Leaving filtered @import in place");
            return Ok(false);
        }

        let current_file = sheet
            .node(id)
            .location
            .file
            .clone()
            .or_else(|| self.ctx.from.clone());
        let cwd = current_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.plugin.import_root.clone());

        let mut pass_through = false;
        let mut found = None;
        for dir in std::iter::once(&cwd).chain(&self.plugin.import_paths) {
            match self.plugin.resolver.resolve(&import_id, dir) {
                Resolution::Found(import) => {
                    found = Some(import);
                    break;
                }
                Resolution::Ambiguous(candidates) => {
                    return Err(Error::AmbiguousImport {
                        id: import_id,
                        candidates,
                        location: sheet.location(id),
                    });
                }
                // The first directory that answers decides, even for `.css`.
                Resolution::PassThrough => {
                    pass_through = true;
                    break;
                }
                Resolution::NotFound => {}
            }
        }

        match found {
            Some(import) => {
                self.inline_import(sheet, id, import, &media, current_file)?;
                Ok(false)
            }
            None if pass_through => Ok(false),
            None => {
                self.unresolved(Error::ImportNotFound {
                    id: import_id,
                    location: sheet.location(id),
                })?;
                Ok(false)
            }
        }
    }

    fn inline_import(
        &mut self,
        sheet: &mut Stylesheet,
        id: NodeId,
        import: ResolvedImport,
        media: &str,
        parent_file: Option<PathBuf>,
    ) -> Result<(), Error> {
        let canonical = import
            .file
            .canonicalize()
            .unwrap_or_else(|_| import.file.clone());
        if self.import_stack.contains(&canonical) {
            return Err(Error::RecursiveImport {
                path: import.file,
                location: sheet.location(id),
            });
        }
        tracing::debug!(file = %import.file.display(), "Inlining @import");

        let fragment = sheet.create_fragment();
        parser::parse_into(sheet, fragment, &import.contents, Some(&import.file))?;
        self.ctx.dependencies.push(Dependency {
            file: import.file.clone(),
            parent: parent_file,
        });

        let nodes = sheet.children(fragment);
        let Some(parent) = sheet.parent(id) else {
            return Ok(());
        };
        let (container, spliced) = if media.is_empty() {
            sheet.replace_with(id, &nodes);
            (parent, nodes)
        } else {
            let location = sheet.location(id);
            let wrapper = sheet.create(Node::at_rule("media", media).with_location(location));
            for &node in &nodes {
                sheet.append(wrapper, node);
            }
            sheet.replace_with(id, &[wrapper]);
            (wrapper, nodes)
        };

        self.import_stack.push(canonical);
        let result = self.transform_nodes(sheet, container, spliced);
        self.import_stack.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::AdvancedVariables;
    use super::*;
    use crate::config::{Options, Unresolved};
    use crate::emitter::emit_css;
    use crate::loader::ImportFilter;
    use crate::pipeline::{Context, Plugin};
    use pretty_assertions::assert_eq;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/imports")
    }

    fn run_file(name: &str, source: &str, options: &Options) -> Result<(String, Context), Error> {
        let path = fixture_dir().join(name);
        let mut sheet = parser::parse(source, Some(&path))?;
        let mut ctx = Context {
            from: Some(path),
            ..Context::default()
        };
        AdvancedVariables::new(options).run(&mut sheet, &mut ctx)?;
        Ok((emit_css(&sheet), ctx))
    }

    #[test]
    fn trims_url_and_quotes() {
        assert_eq!(trim_wrapping_url("url(\"a.css\")"), "a.css");
        assert_eq!(trim_wrapping_url("'b'"), "b");
        assert_eq!(trim_wrapping_url("c"), "c");
    }

    #[test]
    fn inlines_partials_and_records_dependencies() {
        let (css, ctx) = run_file(
            "entry.scss",
            "@import \"partial\";\n.x { color: $partial-color }",
            &Options::default(),
        )
        .expect("transform");
        assert_eq!(
            css,
            ".partial {\n    color: green;\n}\n\n.x {\n    color: green;\n}\n\n"
        );
        assert_eq!(ctx.dependencies.len(), 1);
        assert_eq!(ctx.dependencies[0].file, fixture_dir().join("_partial.scss"));
        assert_eq!(
            ctx.dependencies[0].parent,
            Some(fixture_dir().join("entry.scss"))
        );
    }

    #[test]
    fn media_imports_are_wrapped() {
        let (css, _) = run_file(
            "entry.scss",
            "@import url('nested/inner') screen and (min-width: 1px);",
            &Options::default(),
        )
        .expect("transform");
        assert_eq!(
            css,
            "@media screen and (min-width: 1px) {\n    .inner {\n        padding: 1px;\n    }\n}\n\n"
        );
    }

    #[test]
    fn ambiguous_imports_always_fail() {
        let options = Options {
            unresolved: Unresolved::Ignore,
            ..Options::default()
        };
        let err = run_file("entry.scss", "@import \"foo\";", &options).unwrap_err();
        assert!(matches!(err, Error::AmbiguousImport { .. }));
    }

    #[test]
    fn missing_imports_follow_the_policy() {
        let err = run_file("entry.scss", "@import \"nope\";", &Options::default()).unwrap_err();
        assert!(matches!(err, Error::ImportNotFound { .. }));
        assert_eq!(err.word(), Some("@import"));

        let options = Options {
            unresolved: Unresolved::Warn,
            ..Options::default()
        };
        let (css, ctx) = run_file("entry.scss", "@import \"nope\";", &options).expect("warn");
        assert_eq!(css, "@import \"nope\";\n\n");
        assert_eq!(ctx.diagnostics.warnings().len(), 1);
    }

    #[test]
    fn css_pass_through_and_filtered_imports_stay() {
        let (css, _) = run_file(
            "entry.scss",
            "@import \"missing.css\";\n@import \"https://cdn.example.com/x.css\";",
            &Options::default(),
        )
        .expect("transform");
        assert_eq!(
            css,
            "@import \"missing.css\";\n\n@import \"https://cdn.example.com/x.css\";\n\n"
        );

        let options =
            Options::default().with_import_filter(ImportFilter::Pattern(Regex::new("^theme/").expect("regex")));
        let (css, _) = run_file("entry.scss", "@import \"partial\";", &options).expect("transform");
        assert_eq!(css, "@import \"partial\";\n\n");
    }

    #[test]
    fn import_paths_are_searched_after_the_current_directory() {
        let options = Options {
            import_paths: vec![fixture_dir().join("nested")],
            ..Options::default()
        };
        let (css, _) = run_file("entry.scss", "@import \"inner\";", &options).expect("transform");
        assert_eq!(css, ".inner {\n    padding: 1px;\n}\n\n");
    }

    #[test]
    fn css_pass_through_ends_the_directory_search() {
        let options = Options {
            import_paths: vec![fixture_dir()],
            ..Options::default()
        };
        let (css, ctx) =
            run_file("nested/entry.scss", "@import \"plain.css\";", &options).expect("transform");
        assert_eq!(css, "@import \"plain.css\";\n\n");
        assert!(ctx.dependencies.is_empty());
    }

    #[test]
    fn recursive_imports_are_detected() {
        let source = std::fs::read_to_string(fixture_dir().join("cycle-a.scss")).expect("fixture");
        let err = run_file("cycle-a.scss", &source, &Options::default()).unwrap_err();
        assert!(matches!(err, Error::RecursiveImport { .. }));
        assert!(err.to_string().contains("Recursive import detected"));
    }
}
