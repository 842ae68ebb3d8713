// Chart configuration and vector geometry
use crate::domain::metric::MetricKey;
use crate::domain::series::SeriesBuffer;

pub const PERCENT_FLOOR: f64 = 100.0;
pub const RATE_FLOOR: f64 = 1024.0;

const GRID_LINES: usize = 4;
const AREA_OPACITY: f64 = 0.15;
const MARKER_RADIUS: f64 = 3.0;
const STROKE_WIDTH: f64 = 2.0;
const LEGEND_SPACING: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleMode {
    /// Percent metrics; the axis never shrinks below 100.
    Fixed0To100,
    /// Axis follows the largest observed value, bounded below by a floor.
    AutoMax,
}

impl ScaleMode {
    pub fn default_floor(&self) -> f64 {
        match self {
            Self::Fixed0To100 => PERCENT_FLOOR,
            Self::AutoMax => RATE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec {
    pub metric: MetricKey,
    pub label: String,
    pub color: String,
}

impl SeriesSpec {
    pub fn new(metric: MetricKey, label: String, color: String) -> Self {
        Self {
            metric,
            label,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    pub unit_label: String,
    pub scale_mode: ScaleMode,
    pub floor: Option<f64>,
    pub fill: bool,
    pub series: Vec<SeriesSpec>,
}

impl ChartSpec {
    pub fn new(
        id: String,
        title: String,
        unit_label: String,
        scale_mode: ScaleMode,
        floor: Option<f64>,
        fill: bool,
        series: Vec<SeriesSpec>,
    ) -> Self {
        Self {
            id,
            title,
            unit_label,
            scale_mode,
            floor,
            fill,
            series,
        }
    }

    pub fn floor(&self) -> f64 {
        self.floor
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or_else(|| self.scale_mode.default_floor())
    }
}

/// Logical drawing area; origin is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64, padding: f64) -> Self {
        Self {
            width,
            height,
            padding,
        }
    }

    fn plot_width(&self) -> f64 {
        (self.width - 2.0 * self.padding).max(0.0)
    }

    fn plot_height(&self) -> f64 {
        (self.height - 2.0 * self.padding).max(0.0)
    }

    fn baseline(&self) -> f64 {
        self.padding + self.plot_height()
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(600.0, 200.0, 12.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    GridLine {
        y: f64,
        x1: f64,
        x2: f64,
    },
    Area {
        points: Vec<Point>,
        color: String,
        opacity: f64,
    },
    Polyline {
        points: Vec<Point>,
        color: String,
        stroke_width: f64,
    },
    Marker {
        at: Point,
        radius: f64,
        color: String,
    },
    Label {
        at: Point,
        text: String,
        color: String,
    },
}

/// A fully redrawn chart frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub canvas: Canvas,
    pub max_value: f64,
    pub shapes: Vec<Shape>,
}

impl Picture {
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn polylines(&self) -> impl Iterator<Item = &Vec<Point>> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Polyline { points, .. } => Some(points),
            _ => None,
        })
    }

    pub fn markers(&self) -> impl Iterator<Item = &Point> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Marker { at, .. } => Some(at),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChartRenderer {
    canvas: Canvas,
}

impl ChartRenderer {
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Shared vertical scale for every series of a chart.
    pub fn scale_max(floor: f64, buffers: &[&SeriesBuffer]) -> f64 {
        buffers
            .iter()
            .filter_map(|b| b.max())
            .filter(|v| v.is_finite())
            .fold(floor, f64::max)
    }

    /// Redraw `spec` from scratch. `buffers` follow the order of `spec.series`.
    pub fn render(&self, spec: &ChartSpec, buffers: &[&SeriesBuffer]) -> Picture {
        let max_value = Self::scale_max(spec.floor(), buffers);
        let mut picture = Picture {
            canvas: self.canvas,
            max_value,
            shapes: Vec::new(),
        };

        if buffers.iter().all(|b| b.is_empty()) {
            return picture;
        }

        self.draw_grid(&mut picture.shapes);

        for (series, buffer) in spec.series.iter().zip(buffers) {
            let points = self.project(buffer, max_value);
            let Some(last) = points.last().copied() else {
                continue;
            };

            if points.len() > 1 {
                if spec.fill {
                    picture.shapes.push(Shape::Area {
                        points: self.close_area(&points),
                        color: series.color.clone(),
                        opacity: AREA_OPACITY,
                    });
                }
                picture.shapes.push(Shape::Polyline {
                    points,
                    color: series.color.clone(),
                    stroke_width: STROKE_WIDTH,
                });
            }

            picture.shapes.push(Shape::Marker {
                at: last,
                radius: MARKER_RADIUS,
                color: series.color.clone(),
            });
        }

        if spec.series.len() > 1 {
            self.draw_legend(spec, &mut picture.shapes);
        }

        picture
    }

    fn project(&self, buffer: &SeriesBuffer, max_value: f64) -> Vec<Point> {
        let capacity = buffer.capacity();
        let offset = capacity - buffer.len();
        let step = self.canvas.plot_width() / capacity.saturating_sub(1).max(1) as f64;
        let plot_height = self.canvas.plot_height();

        buffer
            .iter()
            .enumerate()
            .map(|(i, sample)| {
                let ratio = (sample.value.max(0.0) / max_value).min(1.0);
                Point {
                    x: self.canvas.padding + step * (offset + i) as f64,
                    y: self.canvas.baseline() - ratio * plot_height,
                }
            })
            .collect()
    }

    fn close_area(&self, points: &[Point]) -> Vec<Point> {
        let baseline = self.canvas.baseline();
        let mut area = points.to_vec();
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            area.push(Point { x: last.x, y: baseline });
            area.push(Point { x: first.x, y: baseline });
        }
        area
    }

    fn draw_grid(&self, shapes: &mut Vec<Shape>) {
        let spacing = self.canvas.plot_height() / (GRID_LINES - 1) as f64;
        for g in 0..GRID_LINES {
            shapes.push(Shape::GridLine {
                y: self.canvas.padding + spacing * g as f64,
                x1: self.canvas.padding,
                x2: self.canvas.width - self.canvas.padding,
            });
        }
    }

    fn draw_legend(&self, spec: &ChartSpec, shapes: &mut Vec<Shape>) {
        for (i, series) in spec.series.iter().enumerate() {
            shapes.push(Shape::Label {
                at: Point {
                    x: self.canvas.padding + 4.0 + LEGEND_SPACING * i as f64,
                    y: self.canvas.padding + 10.0,
                },
                text: series.label.clone(),
                color: series.color.clone(),
            });
        }
    }
}
