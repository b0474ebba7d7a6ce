pub mod element;
pub mod layout;
pub mod palette;
