pub mod buttons;
pub mod window;
