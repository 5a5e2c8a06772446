mod extract;
mod renderer;
mod text;
mod walker;

pub use renderer::{FeedRenderer, HttpRenderer};
pub use walker::walk_feed;
