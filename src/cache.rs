//! Cache keys, isolation locks, and cache settings.

pub mod key;
pub mod locks;
pub mod settings;

pub use key::*;
pub use locks::*;
pub use settings::*;
