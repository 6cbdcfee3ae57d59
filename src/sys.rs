//! Boundaries to the collaborators the window manager drives but does not
//! own: the render service, the display manager, the ability runtime and the
//! client-side window tokens.

pub mod ability;
pub mod client;
pub mod display;
pub mod geometry;
pub mod render;
