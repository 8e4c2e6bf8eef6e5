//! Template rendering.

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderErrorReason,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Renders job templates and Prow job output templates.
///
/// Runs in strict mode, so a reference to a key missing from the data fails
/// instead of rendering as an empty string. Output is never HTML-escaped.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("indent", Box::new(indent_helper));
        handlebars.register_helper("stringsJoin", Box::new(strings_join_helper));
        handlebars.register_helper("trim", Box::new(trim_helper));

        Self { handlebars }
    }

    /// Render template text with the given data.
    ///
    /// `name` identifies the template in error messages.
    pub fn render<T: Serialize>(
        &self,
        name: &str,
        template: &str,
        data: &T,
    ) -> TemplateResult<Vec<u8>> {
        debug!("Rendering template {}", name);
        self.handlebars
            .render_template(template, data)
            .map(String::into_bytes)
            .map_err(|e| TemplateError::RenderingFailed {
                template: name.to_string(),
                message: e.to_string(),
            })
    }
}

/// Pad every line of the value with the given number of spaces.
pub fn indent(spaces: usize, value: &str) -> String {
    let pad = " ".repeat(spaces);
    format!("{}{}", pad, value.replace('\n', &format!("\n{}", pad)))
}

fn indent_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let spaces = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("indent", 0))?
        .value()
        .as_u64()
        .ok_or(RenderErrorReason::InvalidParamType("number of spaces"))?;
    let value = h
        .param(1)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("indent", 1))?
        .value();

    out.write(&indent(spaces as usize, &display(value)))?;
    Ok(())
}

fn strings_join_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let items = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("stringsJoin", 0))?
        .value()
        .as_array()
        .ok_or(RenderErrorReason::InvalidParamType("array"))?;
    let separator = h
        .param(1)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("stringsJoin", 1))?
        .value()
        .as_str()
        .ok_or(RenderErrorReason::InvalidParamType("string"))?;

    let joined = items.iter().map(display).collect::<Vec<_>>().join(separator);
    out.write(&joined)?;
    Ok(())
}

fn trim_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("trim", 0))?
        .value();
    out.write(display(value).trim())?;
    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobConfig;
    use crate::matrix::ParameterBundle;
    use serde_json::json;

    fn render(template: &str, data: Value) -> TemplateResult<String> {
        let renderer = TemplateRenderer::new();
        renderer
            .render("test.yaml", template, &data)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_variable_substitution() {
        let rendered = render(
            "name: build-{{releaseBranch}}-presubmit",
            json!({"releaseBranch": "1-28"}),
        )
        .unwrap();
        assert_eq!(rendered, "name: build-1-28-presubmit");
    }

    #[test]
    fn test_empty_bundle_render_matches_literal_parse() {
        let template = r#"jobName: lint-presubmit
runIfChanged: "^projects/.*"
commands:
  - make lint && make verify
envVars:
  - name: GOPROXY
    value: direct
"#;

        let rendered = TemplateRenderer::new()
            .render("lint-presubmits.yaml", template, &ParameterBundle::new())
            .unwrap();

        assert_eq!(
            JobConfig::parse("lint-presubmits.yaml", &rendered).unwrap(),
            JobConfig::parse("lint-presubmits.yaml", template.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_no_html_escaping() {
        let rendered = render("{{cmd}}", json!({"cmd": "make a && make b > out"})).unwrap();
        assert_eq!(rendered, "make a && make b > out");
    }

    #[test]
    fn test_undefined_reference_fails() {
        let result = render("version: {{golangVersion}}", json!({"releaseBranch": "1-28"}));
        match result {
            Err(TemplateError::RenderingFailed { template, .. }) => assert_eq!(template, "test.yaml"),
            other => panic!("expected rendering failure, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_template_fails() {
        let result = render("{{#if latest}}unterminated", json!({"latest": true}));
        assert!(matches!(result, Err(TemplateError::RenderingFailed { .. })));
    }

    #[test]
    fn test_conditionals_and_iteration() {
        let template = "{{#if latestReleaseBranch}}latest{{else}}old{{/if}}:{{#each branches}}[{{this}}]{{/each}}";
        let rendered = render(
            template,
            json!({"latestReleaseBranch": true, "branches": ["1-27", "1-28"]}),
        )
        .unwrap();
        assert_eq!(rendered, "latest:[1-27][1-28]");
    }

    #[test]
    fn test_helpers() {
        let rendered = render(
            "{{stringsJoin items \"|\"}}/{{trim padded}}/{{indent 2 block}}",
            json!({"items": ["a", "b", "c"], "padded": "  x  ", "block": "l1\nl2"}),
        )
        .unwrap();
        assert_eq!(rendered, "a|b|c/x/  l1\n  l2");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent(4, "a\nb"), "    a\n    b");
        assert_eq!(indent(0, "a"), "a");
    }
}
