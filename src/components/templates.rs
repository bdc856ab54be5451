use log::debug;

use crate::services::title_from_slug;
use crate::types::TemplateContext;
use crate::utils::escape_html;

const SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{TITLE}}</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/uikit@3.19.4/dist/css/uikit.min.css" />
  {{HEAD}}
  <style>
    html, body { background-color: #1e1e1e !important; color: #ffffff; }
    .uk-navbar-container, .uk-container { background-color: #1e1e1e !important; color: #ffffff; }
    .uk-label { background-color: #3a3a3a; width: 90px; text-align: center; border: 1px solid; }
    .last-modified { font-size: small; }
    a:visited { color: lightblue; }
    .uk-button-default { background-color: #3a3a3a; color: #ffffff; border-radius: 2px; }
    .uk-button-primary { background-color: #007bff; color: #ffffff; width: 110px; height: 40px; border-radius: 2px; }
    #deleteButton { background-color: #dc3545; color: #ffffff; width: 110px; height: 40px; border-radius: 2px; }
    input.uk-input, textarea.uk-textarea { background-color: #1e1e1e; color: #ffffff; border: 1px solid #3a3a3a; }
    .editor-toolbar { background-color: grey; }
    .uk-form-danger { color: #ff4d4d; }
    .uk-width-1-5 { text-align: center; }
  </style>
</head>
<body>
  <nav class="uk-navbar-container">
    <div class="uk-container">
      <div class="uk-navbar">
        <div class="uk-navbar-left">
          <ul class="uk-navbar-nav">
            <li class="uk-active"><a href="/"><span uk-icon="home"></span></a></li>
          </ul>
        </div>
        <div class="uk-navbar-center">
          <div class="uk-navbar-item">
            <form action="/new-page">
              <input class="uk-input uk-form-width-large" type="text" name="pageName" placeholder="Type desired page title here">
              <input type="submit" class="uk-button uk-button-default" value="Add New Page">
            </form>
          </div>
        </div>
      </div>
    </div>
  </nav>
  {{BODY}}
  <script src="https://cdn.jsdelivr.net/npm/uikit@3.19.4/dist/js/uikit.min.js"></script>
  <script src="https://cdn.jsdelivr.net/npm/uikit@3.19.4/dist/js/uikit-icons.min.js"></script>
  {{FOOT}}
</body>
</html>"#;

const EDITOR_HEAD: &str = r#"<link rel="stylesheet" href="https://unpkg.com/easymde/dist/easymde.min.css">
  <script src="https://unpkg.com/easymde/dist/easymde.min.js"></script>"#;

const EDITOR_FOOT: &str = r#"<script>
    var easyMDE = new EasyMDE({ insertTexts: { link: ["[", "]()"] } });
    function copyMarkdownLink(element) {
      element.select();
      document.execCommand("copy");
    }
  </script>"#;

/// Component for handling HTML template rendering
pub struct TemplateComponent;

impl TemplateComponent {
    /// Create a new template component
    pub fn new() -> Self {
        Self
    }

    /// Fill the HTML shell. `title` is a page slug; the heading shows its title-cased form.
    pub fn render_shell_template(&self, context: &TemplateContext) -> String {
        debug!("Rendering shell for '{}'", context.title);
        let heading = escape_html(&title_from_slug(&context.title));

        let body = if context.side_panel.is_empty() {
            format!(
                "<div class=\"uk-container\"><h1>{}</h1>{}</div>",
                heading, context.content
            )
        } else {
            format!(
                "<div class=\"uk-container\"><div uk-grid><div class=\"uk-width-4-5\"><h1 style=\"color:grey\">{}</h1>{}</div><div class=\"uk-width-1-5\">{}</div></div></div>",
                heading, context.content, context.side_panel
            )
        };

        SHELL
            .replace("{{TITLE}}", &escape_html(&context.title))
            .replace("{{HEAD}}", &context.head)
            .replace("{{FOOT}}", &context.foot)
            .replace("{{BODY}}", &body)
    }

    /// A read-only page with the page list beside it
    pub fn render_page(&self, title: &str, content: &str, side_panel: &str) -> String {
        self.render_shell_template(&TemplateContext {
            title: title.to_string(),
            content: content.to_string(),
            side_panel: side_panel.to_string(),
            ..TemplateContext::default()
        })
    }

    /// Same shell plus the markdown editor assets
    pub fn render_editor_page(&self, title: &str, content: &str, side_panel: &str) -> String {
        self.render_shell_template(&TemplateContext {
            title: title.to_string(),
            head: EDITOR_HEAD.to_string(),
            content: content.to_string(),
            side_panel: side_panel.to_string(),
            foot: EDITOR_FOOT.to_string(),
        })
    }
}

impl Default for TemplateComponent {
    fn default() -> Self {
        Self::new()
    }
}
