pub mod canvas;
pub mod frame;
pub mod gpu;
pub mod pipeline;
