pub mod labels;
pub mod locator;
pub mod path;

pub use labels::{Label, LabelKind, PageType};
pub use locator::{PathLocator, Strategy, Structure};
pub use path::{PathExpr, PathSet, Step};
