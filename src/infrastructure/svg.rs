// SVG encoding of chart pictures
use crate::domain::chart::{Picture, Point, Shape};
use std::fmt::Write;

const GRID_COLOR: &str = "rgba(255,255,255,0.1)";

pub fn picture_to_svg(picture: &Picture) -> String {
    let canvas = picture.canvas;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" preserveAspectRatio="none">"#,
        w = num(canvas.width),
        h = num(canvas.height),
    );

    for shape in &picture.shapes {
        // Writing into a String cannot fail
        let _ = match shape {
            Shape::GridLine { y, x1, x2 } => write!(
                svg,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1" stroke-dasharray="2,2"/>"#,
                num(*x1),
                num(*y),
                num(*x2),
                num(*y),
                GRID_COLOR
            ),
            Shape::Area {
                points,
                color,
                opacity,
            } => write!(
                svg,
                r#"<path d="{}" fill="{}" fill-opacity="{}" stroke="none"/>"#,
                closed_path(points),
                escape(color),
                num(*opacity)
            ),
            Shape::Polyline {
                points,
                color,
                stroke_width,
            } => write!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round" stroke-linecap="round"/>"#,
                point_list(points),
                escape(color),
                num(*stroke_width)
            ),
            Shape::Marker { at, radius, color } => write!(
                svg,
                r#"<circle cx="{}" cy="{}" r="{}" fill="{}"/>"#,
                num(at.x),
                num(at.y),
                num(*radius),
                escape(color)
            ),
            Shape::Label { at, text, color } => write!(
                svg,
                r#"<text x="{}" y="{}" font-size="10" fill="{}">{}</text>"#,
                num(at.x),
                num(at.y),
                escape(color),
                escape(text)
            ),
        };
    }

    svg.push_str("</svg>");
    svg
}

fn point_list(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", num(p.x), num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn closed_path(points: &[Point]) -> String {
    let mut path = points
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}{},{}", if i == 0 { 'M' } else { 'L' }, num(p.x), num(p.y)))
        .collect::<Vec<_>>()
        .join(" ");
    path.push_str(" Z");
    path
}

/// Two decimals at most, without trailing zeros.
fn num(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
