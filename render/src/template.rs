use latex_common::Result;
use latex_common::ServiceError;
use latex_sandboxfs::OpenMode;
use latex_session::TemplateRecord;
use minijinja::Environment;
use minijinja::syntax::SyntaxConfig;
use tokio::io::AsyncWriteExt;

/// The Jinja2-for-LaTeX delimiter convention: the default `{{ }}` / `{% %}`
/// set collides constantly with LaTeX's own brace and percent syntax, so
/// every delimiter is replaced with something that never appears in a
/// typesetting source file.
fn latex_syntax() -> Result<SyntaxConfig> {
    SyntaxConfig::builder()
        .block_delimiters("\\BLOCK{", "}")
        .variable_delimiters("\\EXPR{", "}")
        .comment_delimiters("\\#{", "}")
        .line_statement_prefix("%#")
        .line_comment_prefix("%##")
        .build()
        .map_err(|err| ServiceError::Fatal(format!("invalid template syntax config: {err}")))
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_syntax(latex_syntax()?);
    env.set_trim_blocks(true);
    env.set_keep_trailing_newline(false);
    env.set_auto_escape_callback(|_name| minijinja::AutoEscape::None);
    Ok(env)
}

/// Renders one template's `text` against its `data` namespace.
pub fn render_template(template: &TemplateRecord) -> Result<String> {
    let env = environment()?;
    env.render_str(&template.text, &template.data).map_err(|err| {
        ServiceError::CompileFailure(format!(
            "failed to render template for target '{}': {err}",
            template.target
        ))
    })
}

/// Expands every template in the session and writes the result into
/// `source/<target>`, creating intermediate directories as needed (§4.6
/// step 2).
pub async fn expand_templates(session: &latex_session::Session) -> Result<()> {
    let templates = session.templates().await?;
    for template in templates.values() {
        let rendered = render_template(template)?;
        let mut handle = session
            .source_files()
            .open(&template.target, OpenMode::Write)
            .await?;
        handle.write_all(rendered.as_bytes()).await?;
        handle.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_expressions_and_nested_attributes() {
        let template = TemplateRecord {
            target: "rendered.tex".into(),
            text: "\\EXPR{name_1}\n\\EXPR{data2.name}".into(),
            data: json!({"name_1": "A", "data2": {"name": "B"}}),
        };
        let rendered = render_template(&template).expect("render");
        assert_eq!(rendered, "A\nB");
    }

    #[test]
    fn block_and_comment_delimiters_do_not_collide_with_latex_braces() {
        let template = TemplateRecord {
            target: "loop.tex".into(),
            text: "\\#{ a comment }\\BLOCK{ for x in items }\\EXPR{x}\\BLOCK{ endfor }".into(),
            data: json!({"items": [1, 2, 3]}),
        };
        let rendered = render_template(&template).expect("render");
        assert_eq!(rendered, "123");
    }

    #[test]
    fn line_statement_prefix_drives_control_flow() {
        let template = TemplateRecord {
            target: "lines.tex".into(),
            text: "%# for x in items\n\\EXPR{x}\n%# endfor\n".into(),
            data: json!({"items": ["a", "b"]}),
        };
        let rendered = render_template(&template).expect("render");
        assert_eq!(rendered, "a\nb\n");
    }
}
