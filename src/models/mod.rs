pub mod context;
pub mod enums;
pub mod prediction;
pub mod profile;

pub use context::*;
pub use enums::*;
pub use prediction::*;
pub use profile::*;
