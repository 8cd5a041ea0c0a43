pub mod series;
pub mod family;
pub mod params;
pub mod forecast;
pub mod errors;

pub use series::*;
pub use family::*;
pub use params::*;
pub use forecast::*;
pub use errors::*;
