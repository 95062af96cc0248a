//! Per-store visual encoding shared by every chart of a rendering session

use plotters::style::RGBColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dotted,
    Dashed,
    DashDot,
}

impl LineStyle {
    pub const ALL: [LineStyle; 4] = [
        LineStyle::Solid,
        LineStyle::Dotted,
        LineStyle::Dashed,
        LineStyle::DashDot,
    ];

    /// Dash and gap lengths in pixels, `None` for a continuous line
    pub fn pattern(&self) -> Option<(u32, u32)> {
        match self {
            LineStyle::Solid => None,
            LineStyle::Dotted => Some((2, 4)),
            LineStyle::Dashed => Some((8, 5)),
            LineStyle::DashDot => Some((14, 4)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
    Triangle,
    Diamond,
}

impl Marker {
    pub const ALL: [Marker; 4] = [Marker::Circle, Marker::Square, Marker::Triangle, Marker::Diamond];
}

/// Grey ramp bounds; 0.0 is white and 1.0 is black
const SHADE_RANGE: (f64, f64) = (0.3, 0.8);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStyle {
    pub line: LineStyle,
    pub marker: Marker,
    /// Position on the white-to-black ramp
    pub shade: f64,
}

impl SeriesStyle {
    /// Style of the store at `index` among `count` stores. Line styles and
    /// markers cycle; shades are spread evenly over the ramp.
    pub fn for_index(index: usize, count: usize) -> Self {
        let (low, high) = SHADE_RANGE;
        let shade = if count > 1 {
            low + (high - low) * index as f64 / (count - 1) as f64
        } else {
            low
        };

        Self {
            line: LineStyle::ALL[index % LineStyle::ALL.len()],
            marker: Marker::ALL[index % Marker::ALL.len()],
            shade,
        }
    }

    pub fn color(&self) -> RGBColor {
        let level = ((1.0 - self.shade.clamp(0.0, 1.0)) * 255.0).round() as u8;
        RGBColor(level, level, level)
    }
}

/// Style assignment for an ordered list of stores
#[derive(Debug, Clone, PartialEq)]
pub struct StylePalette {
    styles: Vec<(String, SeriesStyle)>,
}

impl StylePalette {
    pub fn assign(stores: &[String]) -> Self {
        let styles = stores
            .iter()
            .enumerate()
            .map(|(i, store)| (store.clone(), SeriesStyle::for_index(i, stores.len())))
            .collect();
        Self { styles }
    }

    pub fn style(&self, store: &str) -> Option<SeriesStyle> {
        self.styles
            .iter()
            .find(|(name, _)| name == store)
            .map(|(_, style)| *style)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("store{}_db", i)).collect()
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let names = stores(3);
        assert_eq!(StylePalette::assign(&names), StylePalette::assign(&names));

        let palette = StylePalette::assign(&names);
        let first = palette.style("store0_db").unwrap();
        assert_eq!(first.line, LineStyle::Solid);
        assert_eq!(first.marker, Marker::Circle);
        assert_eq!(first.shade, 0.3);
        assert!((palette.style("store2_db").unwrap().shade - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_more_stores_than_primitives_cycle() {
        let palette = StylePalette::assign(&stores(9));
        assert_eq!(palette.len(), 9);

        let fifth = palette.style("store4_db").unwrap();
        assert_eq!(fifth.line, LineStyle::Solid);
        assert_eq!(fifth.marker, Marker::Circle);
        assert_eq!(palette.style("store7_db").unwrap().marker, Marker::Diamond);
        assert!(palette.style("unknown_db").is_none());
    }

    #[test]
    fn test_shades_darken_along_the_list() {
        let light = SeriesStyle::for_index(0, 2).color();
        let dark = SeriesStyle::for_index(1, 2).color();
        assert_eq!(dark, RGBColor(51, 51, 51));
        assert!(light.0 > dark.0);
        assert_eq!(light.0, light.1);
    }
}
