mod bookmark;
mod core;
pub mod description_list;
mod document;
mod edit;
pub mod markup;
mod ops;
mod plugin;
mod serde_value;

pub use crate::bookmark::*;
pub use crate::core::*;
pub use crate::description_list::{
    DescriptionListPlugin, DescriptionListState, ListError, build_list, remove_list, toggle_roles,
};
pub use crate::document::*;
pub use crate::edit::*;
pub use crate::markup::MarkupError;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::serde_value::*;
