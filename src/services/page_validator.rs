use crate::errors::ValidationErrors;
use crate::services::slug::page_name_from_input;
use crate::types::PageInput;

/// Field rules for a page submission.
///
/// `current_name` is the name the page is being edited under: the route
/// segment in the web layer, the stored name in the repository. When that is
/// the home page the submitted name has to stay the home page name.
pub struct PageValidator<'a> {
    current_name: Option<&'a str>,
    home_page_name: &'a str,
}

impl<'a> PageValidator<'a> {
    pub fn new(current_name: Option<&'a str>, home_page_name: &'a str) -> Self {
        Self { current_name, home_page_name }
    }

    pub fn validate(&self, input: &PageInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let proper_name = page_name_from_input(&input.name);
        if input.name.trim().is_empty() || proper_name.is_empty() {
            errors.add("Name", "Name is required");
        } else if self.is_home_page() && !proper_name.eq_ignore_ascii_case(self.home_page_name) {
            errors.add(
                "Name",
                format!(
                    "You cannot modify home page name. Please keep it {}",
                    self.home_page_name
                ),
            );
        }

        if input.content.trim().is_empty() {
            errors.add("Content", "Content is required");
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn is_home_page(&self) -> bool {
        self.current_name
            .is_some_and(|name| name.eq_ignore_ascii_case(self.home_page_name))
    }
}
