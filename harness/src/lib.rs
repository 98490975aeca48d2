pub mod render;

pub use render::{preview, PREVIEW_CHARS};
