//! Selection trees for the Trellis cache.
//!
//! A selection tree is the compiled shape of a query: which fields to read
//! or write, how they nest, and under what conditions they apply. Trellis
//! never parses query text; a compiler collaborator hands over immutable
//! trees built from the types in this crate, and the reader, normalizer,
//! and subtractor all traverse the same representation.
//!
//! The addressing unit is the [`Selector`]: an [`Operation`] (a named tree)
//! anchored at a record id with concrete [`Variables`]. Everything that
//! reads, writes, fetches, or diffs cache data does so through a selector.
//!
//! [`Variables`]: trellis_types::Variables

pub mod arguments;
pub mod field;
pub mod fragment;
pub mod operation;
pub mod selection;

pub use arguments::{Argument, ArgumentValue};
pub use field::{LinkedField, ScalarField};
pub use fragment::{Condition, InlineFragment};
pub use operation::{Operation, Selector};
pub use selection::Selection;
