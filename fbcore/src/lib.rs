pub mod expansion;
pub mod format;
pub mod gallery;
pub mod rows;
pub mod schema;
pub mod sections;
pub mod topic;
pub mod view;
pub mod window;

pub use schema::{Request, Response, RosterEvent};
pub use sections::{RosterSection, RosterSections, ViewSections};
pub use topic::SessionContext;
pub use view::ViewOptions;
