pub mod audio;
pub mod load_chain;
pub mod model;
pub mod motion;
pub mod source;
