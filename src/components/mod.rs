pub mod navigation;
pub mod page;
pub mod templates;

pub use navigation::NavigationComponent;
pub use page::{PageAction, PageComponent};
pub use templates::TemplateComponent;
