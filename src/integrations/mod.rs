//! External service integrations.

pub mod places {
    pub use crate::places::*;
}

pub mod overpass {
    pub use crate::overpass::*;
}
