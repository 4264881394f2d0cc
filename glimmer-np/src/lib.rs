//! Dense 2-D numeric matrices with strict element-type discipline, a
//! bit-exact NumPy `.npy` v1 codec, and the statistical kernels (t-tests,
//! Pearson correlation) used by the Glimmer side-channel analyses.
//!
//! The central type is [`NpArray`], a row-major matrix parameterised on one of
//! the ten legal element types (see [`Element`]). Arrays loaded from disk
//! carry an error state instead of panicking: check [`NpArray::good`] before
//! use.

#![warn(missing_docs)]

mod adapter;
mod array;
mod element;
mod npy;
pub mod ops;
pub mod stats;

pub use adapter::NpAdapter;
pub use array::{concat, convert, Axis, NpArray, RowView};
pub use element::Element;
pub use npy::{read_npy_header, NpyError, NpyHeader};
