use log::debug;

use crate::errors::ValidationErrors;
use crate::services::MarkdownService;
use crate::types::{Page, PageInput};
use crate::utils::{escape_attr, escape_html, format_display_date};

/// A link or button offered next to a page
#[derive(Debug, Clone)]
pub struct PageAction {
    pub href: String,
    pub title: String,
    pub class: String,
}

/// Component for the body of a page: rendered content, attachments, and the editor form
pub struct PageComponent {
    markdown: MarkdownService,
}

impl PageComponent {
    pub fn new() -> Self {
        Self { markdown: MarkdownService::new() }
    }

    /// Actions available when viewing `page`
    pub fn generate_actions(&self, page: &Page) -> Vec<PageAction> {
        vec![PageAction {
            href: format!("/edit?pageName={}", urlencoding::encode(&page.name)),
            title: "Edit".to_string(),
            class: "uk-button uk-button-default uk-button-small".to_string(),
        }]
    }

    /// Rendered markdown, attachment links, last modified date, and actions
    pub fn render_view(&self, page: &Page) -> String {
        debug!("Rendering view for page {} '{}'", page.id, page.name);

        let mut html = String::new();
        html.push_str(&self.markdown.render(&page.content));
        html.push_str(&self.render_attachments(page));
        html.push_str(&format!(
            "<div class=\"last-modified\">Last modified: {}</div>",
            format_display_date(page.last_modified_utc)
        ));
        for action in self.generate_actions(page) {
            html.push_str(&format!(
                "<a href=\"{}\" class=\"{}\">{}</a>",
                escape_attr(&action.href),
                escape_attr(&action.class),
                escape_html(&action.title)
            ));
        }
        html
    }

    /// Download links for each attachment, empty when there are none
    pub fn render_attachments(&self, page: &Page) -> String {
        if page.attachments.is_empty() {
            return String::new();
        }

        let mut html = String::from("<span class=\"uk-label\">Attachments</span><ul class=\"uk-list uk-list-disc\">");
        for attachment in &page.attachments {
            html.push_str(&format!(
                "<li><a href=\"/attachment?fileId={}\">{}</a></li>",
                escape_attr(&urlencoding::encode(&attachment.file_id)),
                escape_html(&attachment.file_name)
            ));
        }
        html.push_str("</ul>");
        html
    }

    /// Attachment list for the editor: a copyable markdown link and a delete form per entry
    pub fn render_attachments_for_edit(&self, page: &Page) -> String {
        if page.attachments.is_empty() {
            return String::new();
        }

        let mut html = String::from("<span class=\"uk-label\">Attachments</span><ul class=\"uk-list\">");
        for attachment in &page.attachments {
            let link = format!(
                "[{}](/attachment?fileId={})",
                attachment.file_name,
                urlencoding::encode(&attachment.file_id)
            );
            html.push_str(&format!(
                "<li><span class=\"uk-inline\"><span class=\"uk-form-icon\" uk-icon=\"icon: copy\"></span>\
                 <input class=\"uk-input uk-form-small uk-form-width-large\" type=\"text\" readonly style=\"cursor: pointer\" onclick=\"copyMarkdownLink(this);\" value=\"{}\"></span>\
                 <form style=\"display: inline\" method=\"post\" action=\"/delete-attachment\" onsubmit=\"return confirm('Please confirm to delete this attachment');\">\
                 <input type=\"hidden\" name=\"Id\" value=\"{}\"><input type=\"hidden\" name=\"PageId\" value=\"{}\">\
                 <button class=\"uk-button uk-button-danger uk-button-small\"><span uk-icon=\"icon: close; ratio: .75;\"></span></button></form></li>",
                escape_attr(&link),
                escape_attr(&attachment.file_id),
                page.id
            ));
        }
        html.push_str("</ul>");
        html
    }

    pub fn render_delete_page_button(&self, page: &Page) -> String {
        format!(
            "<form method=\"post\" action=\"/delete-page\" onsubmit=\"return confirm('Please confirm to delete this page');\">\
             <input type=\"hidden\" name=\"Id\" value=\"{}\">\
             <div style=\"margin-top: 20px\"><button class=\"uk-button uk-button-danger\" id=\"deleteButton\">Delete</button></div></form>",
            page.id
        )
    }

    /// Multipart editor form posting back to `/{path}`, with any field errors under their fields
    pub fn render_form(&self, input: &PageInput, path: &str, errors: Option<&ValidationErrors>) -> String {
        debug!("Rendering editor form for '{}'", path);

        let field_errors = |field: &str| -> String {
            errors
                .map(|errs| {
                    errs.for_field(field)
                        .map(|msg| format!("<div class=\"uk-form-danger uk-text-small\">{}</div>", escape_html(msg)))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut html = format!(
            "<form class=\"uk-form-stacked\" method=\"post\" enctype=\"multipart/form-data\" action=\"/{}\">",
            escape_attr(path)
        );
        html.push_str(&format!(
            "<div><label class=\"uk-form-label\">Name</label><div class=\"uk-form-controls\">\
             <input class=\"uk-input\" type=\"text\" name=\"Name\" value=\"{}\"></div>{}</div>",
            escape_attr(&input.name),
            field_errors("Name")
        ));
        html.push_str(&format!(
            "<div><label class=\"uk-form-label\">Content</label><div class=\"uk-form-controls\">\
             <textarea name=\"Content\" class=\"uk-textarea\">{}</textarea></div>{}</div>",
            escape_html(&input.content),
            field_errors("Content")
        ));
        html.push_str(
            "<div><label class=\"uk-form-label\">Attachment</label><div uk-form-custom=\"target: true\">\
             <input type=\"file\" name=\"Attachment\">\
             <input class=\"uk-input uk-form-width-large\" type=\"text\" placeholder=\"Click to select file\" disabled></div></div>",
        );
        if let Some(id) = input.id {
            html.push_str(&format!("<input type=\"hidden\" name=\"Id\" value=\"{}\">", id));
        }
        html.push_str("<div style=\"margin-top: 20px\"><button class=\"uk-button uk-button-primary\">Submit</button></div></form>");
        html
    }
}

impl Default for PageComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attachment;
    use time::macros::datetime;

    fn page_with_attachment() -> Page {
        Page {
            id: 7,
            name: "my-notes".to_string(),
            content: "Hello <script>alert(1)</script>**world**".to_string(),
            last_modified_utc: datetime!(2024-03-04 10:00 UTC),
            attachments: vec![Attachment {
                file_id: "abc-123".to_string(),
                file_name: "a<b>.txt".to_string(),
                mime_type: "text/plain".to_string(),
                last_modified_utc: datetime!(2024-03-04 10:00 UTC),
            }],
        }
    }

    #[test]
    fn view_renders_sanitized_content_and_metadata() {
        let html = PageComponent::new().render_view(&page_with_attachment());
        assert!(html.contains("<strong>world</strong>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Last modified: March 04, 2024"));
        assert!(html.contains("href=\"/edit?pageName=my-notes\""));
        assert!(html.contains("<a href=\"/attachment?fileId=abc-123\">a&lt;b&gt;.txt</a>"));
    }

    #[test]
    fn edit_link_percent_encodes_the_page_name() {
        let mut page = page_with_attachment();
        page.name = "über notes".to_string();
        let actions = PageComponent::new().generate_actions(&page);
        assert_eq!(actions[0].href, "/edit?pageName=%C3%BCber%20notes");
    }

    #[test]
    fn no_attachments_means_no_attachment_section() {
        let mut page = page_with_attachment();
        page.attachments.clear();
        let component = PageComponent::new();
        assert!(component.render_attachments(&page).is_empty());
        assert!(component.render_attachments_for_edit(&page).is_empty());
    }

    #[test]
    fn edit_list_posts_attachment_and_page_ids() {
        let html = PageComponent::new().render_attachments_for_edit(&page_with_attachment());
        assert!(html.contains("action=\"/delete-attachment\""));
        assert!(html.contains("name=\"Id\" value=\"abc-123\""));
        assert!(html.contains("name=\"PageId\" value=\"7\""));
        assert!(html.contains("[a&lt;b&gt;.txt](/attachment?fileId=abc-123)"));
    }

    #[test]
    fn delete_button_posts_page_id() {
        let html = PageComponent::new().render_delete_page_button(&page_with_attachment());
        assert!(html.contains("action=\"/delete-page\""));
        assert!(html.contains("name=\"Id\" value=\"7\""));
    }

    #[test]
    fn form_shows_field_errors_and_hidden_id() {
        let mut errors = ValidationErrors::new();
        errors.add("Content", "Content is required");
        let input = PageInput::new(Some(3), "notes", "");

        let html = PageComponent::new().render_form(&input, "notes", Some(&errors));
        assert!(html.contains("action=\"/notes\""));
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(html.contains("<div class=\"uk-form-danger uk-text-small\">Content is required</div>"));
        assert!(html.contains("name=\"Id\" value=\"3\""));
    }

    #[test]
    fn new_page_form_has_no_id() {
        let html = PageComponent::new().render_form(&PageInput::new(None, "fresh", ""), "fresh", None);
        assert!(!html.contains("name=\"Id\""));
        assert!(!html.contains("uk-form-danger"));
    }
}
