mod cascade;
pub mod policy;
mod tile;

pub use cascade::CascadePolicy;
pub use policy::{LayoutBase, LayoutContext, LayoutPolicy, LayoutPolicyKind, SplitRects};
pub use tile::TilePolicy;

#[cfg(test)]
mod tests;
