pub mod page;

pub use page::{ElementRef, Page, PageId, PageModel};
