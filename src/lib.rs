#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod layout;
pub mod layout_dump;
pub mod person;
pub mod store;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutConfig, LayoutHooks, load_config};
pub use layout::{
    Diagnostic, Dimensions, Link, LinkEnd, LinkKind, NodeIdx, NodeKind, PathToMain, TreeLayout,
    TreeNode, ViewTransform, Viewport, center_on, compute_layout,
};
pub use person::{Gender, Person, PersonId, RelType, Relations};
pub use store::{RelationStore, StoreError, ToggleKey};
