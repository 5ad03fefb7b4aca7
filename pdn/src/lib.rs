//! Power distribution network shapes and vias.
//!
//! [`shape::Shape`]s are the wire segments of a power grid, each carrying the
//! obstruction halo other metal must stay out of. [`connect::Connect`] sizes
//! and places [`via::Via`]s where shapes on different layers cross, and
//! stamps them into a [`db::Block`].

pub mod connect;
pub mod db;
pub mod error;
pub mod grid;
pub mod index;
pub mod shape;
pub mod tech;
pub mod via;

pub(crate) mod log;

pub use connect::{Connect, ConnectConfig};
pub use error::{PdnError, Result};
pub use shape::{Shape, ShapeType};
pub use tech::Tech;
pub use via::Via;
