//! Chart renderer: draws one task as an error-bar plot and writes the image

use std::fs;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::style::{Marker, SeriesStyle, StylePalette};
use super::task::{ChartData, ChartTask};
use crate::error::{ConfigError, RenderError, Result};
use crate::store::FilteredStore;

const TITLE_FONT_SIZE: u32 = 24;
const LABEL_FONT_SIZE: u32 = 16;
const MARKER_SIZE: i32 = 4;
const ERROR_BAR_WIDTH: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    pub output_dir: PathBuf,
    pub format: ImageFormat,
    pub size: (u32, u32),
    /// Thread count marked with a vertical line
    pub reference_threads: Option<u32>,
}

impl ChartRenderer {
    pub fn image_path(&self, task: &ChartTask) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", task.id(), self.format.extension()))
    }

    /// Render one task and return the image path
    pub fn render(
        &self,
        task: &ChartTask,
        data: &FilteredStore,
        palette: &StylePalette,
    ) -> Result<PathBuf> {
        let title = task.title()?;
        let chart = task.extract(data)?;
        let styles = task
            .stores
            .iter()
            .map(|store| {
                palette.style(store).ok_or_else(|| ConfigError::MissingData {
                    task: task.id(),
                    path: format!("style for {}", store),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::OutputDirectory {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self.image_path(task);
        let drawing_err = |reason: String| RenderError::Drawing {
            task: task.id(),
            reason,
        };
        match self.format {
            ImageFormat::Png => {
                let root = BitMapBackend::new(&path, self.size).into_drawing_area();
                self.draw(&root, task, title, &chart, &styles)
                    .map_err(|e| drawing_err(e.to_string()))?;
            }
            ImageFormat::Svg => {
                let root = SVGBackend::new(&path, self.size).into_drawing_area();
                self.draw(&root, task, title, &chart, &styles)
                    .map_err(|e| drawing_err(e.to_string()))?;
            }
        }

        info!("Rendered {} to {}", task.id(), path.display());
        Ok(path)
    }

    /// Render every task, stopping at the first failure
    pub fn render_all(
        &self,
        tasks: &[ChartTask],
        data: &FilteredStore,
        palette: &StylePalette,
    ) -> Result<Vec<PathBuf>> {
        tasks
            .iter()
            .map(|task| self.render(task, data, palette))
            .collect()
    }

    fn x_range(&self, chart: &ChartData) -> (f64, f64) {
        let mut low = chart.thread_counts.first().copied().unwrap_or(1);
        let mut high = chart.thread_counts.last().copied().unwrap_or(1);
        if let Some(reference) = self.reference_threads {
            low = low.min(reference);
            high = high.max(reference);
        }
        (low as f64 - 0.5, high as f64 + 0.5)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        task: &ChartTask,
        title: &str,
        chart: &ChartData,
        styles: &[SeriesStyle],
    ) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        root.fill(&WHITE)?;

        let (x_low, x_high) = self.x_range(chart);
        let y_max = match chart.y_max() {
            max if max > 0.0 => max * 1.1,
            _ => 1.0,
        };
        let (x_desc, y_desc) = task.axes();

        let mut ctx = ChartBuilder::on(root)
            .caption(title, ("sans-serif", TITLE_FONT_SIZE))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(x_low..x_high, 0.0..y_max)?;

        let x_ticks = (x_high - x_low).round() as usize;
        ctx.configure_mesh()
            .disable_x_mesh()
            .x_labels(x_ticks.max(1))
            .x_label_formatter(&|x| {
                if (x - x.round()).abs() < 1e-6 {
                    format!("{}", x.round() as i64)
                } else {
                    String::new()
                }
            })
            .x_desc(x_desc)
            .y_desc(y_desc)
            .label_style(("sans-serif", LABEL_FONT_SIZE))
            .axis_desc_style(("sans-serif", LABEL_FONT_SIZE))
            .draw()?;

        if let Some(reference) = self.reference_threads {
            let x = reference as f64;
            ctx.draw_series(LineSeries::new(
                vec![(x, 0.0), (x, y_max)],
                BLACK.mix(0.4).stroke_width(1),
            ))?;
        }

        for (series, style) in chart.series.iter().zip(styles) {
            if series.points.is_empty() {
                warn!(task = %task.id(), store = %series.store, "nothing to plot");
                continue;
            }

            let color = style.color();
            let line_style = color.stroke_width(2);
            let points: Vec<(f64, f64)> = series
                .points
                .iter()
                .map(|p| (p.threads as f64, p.mean))
                .collect();

            let anno = match style.line.pattern() {
                None => ctx.draw_series(LineSeries::new(points.clone(), line_style))?,
                Some((dash, gap)) => {
                    ctx.draw_series(DashedLineSeries::new(points.clone(), dash, gap, line_style))?
                }
            };
            anno.label(legend_label(&series.store)).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });

            ctx.draw_series(series.points.iter().map(|p| {
                ErrorBar::new_vertical(
                    p.threads as f64,
                    p.mean - p.std,
                    p.mean,
                    p.mean + p.std,
                    color.stroke_width(1),
                    ERROR_BAR_WIDTH,
                )
            }))?;

            let fill = color.filled();
            match style.marker {
                Marker::Circle => {
                    ctx.draw_series(points.iter().map(|&p| Circle::new(p, MARKER_SIZE, fill)))?;
                }
                Marker::Square => {
                    ctx.draw_series(points.iter().map(|&p| {
                        EmptyElement::at(p)
                            + Rectangle::new([(-MARKER_SIZE, -MARKER_SIZE), (MARKER_SIZE, MARKER_SIZE)], fill)
                    }))?;
                }
                Marker::Triangle => {
                    ctx.draw_series(
                        points
                            .iter()
                            .map(|&p| TriangleMarker::new(p, MARKER_SIZE + 1, fill)),
                    )?;
                }
                Marker::Diamond => {
                    let r = MARKER_SIZE + 1;
                    ctx.draw_series(points.iter().map(|&p| {
                        EmptyElement::at(p) + Polygon::new(vec![(0, -r), (r, 0), (0, r), (-r, 0)], fill)
                    }))?;
                }
            }
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", LABEL_FONT_SIZE))
            .draw()?;

        root.present()?;
        Ok(())
    }
}

/// Legend text for a store: its identity without a trailing `_db`
pub fn legend_label(store: &str) -> String {
    store.strip_suffix("_db").unwrap_or(store).to_string()
}

/// Render a list of tasks against the filtered store at `filtered_path`.
/// With no tasks, one is derived per workload, distribution and metric.
pub fn run(renderer: &ChartRenderer, filtered_path: &Path, tasks: &[ChartTask]) -> Result<Vec<PathBuf>> {
    let data = FilteredStore::load(filtered_path)?;
    let palette = StylePalette::assign(&data.store_names());

    let derived;
    let tasks = if tasks.is_empty() {
        derived = ChartTask::defaults_for(&data);
        info!("No chart tasks configured, derived {} from {}", derived.len(), filtered_path.display());
        derived.as_slice()
    } else {
        tasks
    };

    renderer.render_all(tasks, &data, &palette)
}
