pub mod messages;
pub mod pixel;
pub mod tile;
