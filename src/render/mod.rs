pub mod canvas;
pub mod font;
pub mod scenes;

pub use canvas::Canvas;
pub use scenes::Scenes;
