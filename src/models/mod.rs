pub mod case;
pub mod document;
pub mod enums;
pub mod events;
pub mod findings;
pub mod merit;
pub mod routing;

pub use case::*;
pub use document::*;
pub use enums::*;
pub use events::*;
pub use findings::*;
pub use merit::*;
pub use routing::*;
