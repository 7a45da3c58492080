pub mod collaborators;
pub mod errors;
pub mod events;

pub use collaborators::*;
pub use errors::*;
pub use events::*;
