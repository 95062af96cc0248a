//! Chart tasks, style assignment and rendering

pub mod render;
pub mod style;
pub mod task;

pub use render::{ChartRenderer, ImageFormat};
pub use style::{LineStyle, Marker, SeriesStyle, StylePalette};
pub use task::{unit, workload_title, ChartData, ChartTask, Point, Series};
