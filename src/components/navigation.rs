use log::debug;

use crate::services::title_from_slug;
use crate::types::Page;
use crate::utils::{escape_attr, escape_html};

/// Component for the page list shown beside every page
pub struct NavigationComponent<'a> {
    pages: &'a [Page],
}

impl<'a> NavigationComponent<'a> {
    /// Create a navigation component over a listing snapshot
    pub fn new(pages: &'a [Page]) -> Self {
        Self { pages }
    }

    /// Plain links to every page, the current one marked active
    pub fn build_page_list_html(&self, current_name: &str) -> String {
        debug!("Building page list with {} pages for '{}'", self.pages.len(), current_name);
        let start_time = std::time::Instant::now();

        let mut html = String::from("<span class=\"uk-label\">Pages</span><ul class=\"uk-list\">");
        for page in self.pages {
            let active = if page.name.eq_ignore_ascii_case(current_name) {
                " class=\"uk-active\""
            } else {
                ""
            };
            html.push_str(&format!(
                "<li{}><a href=\"/{}\">{}</a></li>",
                active,
                escape_attr(&page.name),
                escape_html(&title_from_slug(&page.name))
            ));
        }
        html.push_str("</ul>");

        debug!("Page list built in {:?}", start_time.elapsed());
        html
    }

    /// Markdown links ready to paste into the editor
    pub fn build_link_list_html(&self) -> String {
        debug!("Building markdown link list with {} pages", self.pages.len());

        let mut html = String::from("<span class=\"uk-label\">Pages</span><ul class=\"uk-list\">");
        for page in self.pages {
            let link = format!("[{}](/{})", title_from_slug(&page.name), page.name);
            html.push_str(&format!(
                "<li><input class=\"uk-input\" type=\"text\" readonly onclick=\"copyMarkdownLink(this)\" value=\"{}\"></li>",
                escape_attr(&link)
            ));
        }
        html.push_str("</ul>");
        html
    }
}
