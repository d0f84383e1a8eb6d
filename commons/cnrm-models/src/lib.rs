pub mod descriptor;
pub mod manifest;
pub mod status;

pub use descriptor::*;
pub use manifest::*;
pub use status::*;
