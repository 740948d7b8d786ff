pub mod clip;
pub mod helper;
pub mod ik;
pub mod physics;
pub mod skinning;
