//! Recorded line data and its persistence
//!
//! This module holds everything the UI thread keeps about the plotted lines:
//!
//! - [`LineBuffer`] - `(relative time, value)` pairs of one line
//! - [`LineSnapshot`] - the persisted form of a buffer
//! - [`DataStore`] - JSON data file keyed `data_{id}`
//! - [`TimePlotData`] - consumer of pipeline events, owns all buffers

pub mod buffer;
pub mod plot_data;
pub mod store;

pub use buffer::{LineBuffer, LineSnapshot};
pub use plot_data::TimePlotData;
pub use store::{DataStore, Document};
