//! Miscellaneous common structs used throughout the library.

mod closest_nodes;
mod id;
mod immutable;
mod item;
mod mutable;
mod node;

pub use closest_nodes::*;
pub use id::*;
pub use immutable::*;
pub use item::*;
pub use mutable::*;
pub use node::*;
