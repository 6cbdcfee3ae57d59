//! Single-threaded window state. Nothing in here talks to a collaborator
//! directly except through the node's surface and client handles; side
//! effects that need another service are queued in [`pending`].

pub mod avoid_area;
pub mod error;
pub mod node_container;
pub mod parcel;
pub mod pending;
pub mod session_property;
pub mod types;
pub mod window_node;
pub mod window_pair;
pub mod window_property;
pub mod window_root;
pub mod zorder_policy;
