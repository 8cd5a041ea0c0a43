pub mod loaders;
pub mod news;

pub use loaders::*;
pub use news::*;
