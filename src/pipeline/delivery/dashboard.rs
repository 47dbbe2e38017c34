//! SVG dashboard generation
//!
//! Panels are laid out on a two-column grid in the order they are added. The
//! renderer is plain string building so the same data always yields the same file.

use std::f64::consts::PI;
use std::fmt::Write as _;

const PANEL_WIDTH: f64 = 600.0;
const PANEL_HEIGHT: f64 = 450.0;
const HEADER_HEIGHT: f64 = 60.0;
const COLUMNS: usize = 2;

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;

const AXIS_COLOR: &str = "#444444";
const FONT: &str = "font-family=\"Helvetica, Arial, sans-serif\"";

/// One bar or pie slice
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
    pub color: &'static str,
}

impl DataPoint {
    pub fn new(label: impl Into<String>, value: f64, color: &'static str) -> Self {
        Self {
            label: label.into(),
            value,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: &'static str,
}

/// How a panel draws its data points
#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    /// Bars grow to the right, first point on top
    HorizontalBar,
    /// Bars grow upward; `y_max` fixes the scale (e.g. 100 for percentages)
    VerticalBar { y_max: Option<f64> },
    /// Slices clockwise from twelve o'clock, labelled with their share
    Pie,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub kind: ChartKind,
    pub points: Vec<DataPoint>,
    pub axis_label: Option<String>,
    pub legend: Vec<LegendEntry>,
}

impl Panel {
    pub fn new(title: impl Into<String>, kind: ChartKind, points: Vec<DataPoint>) -> Self {
        Self {
            title: title.into(),
            kind,
            points,
            axis_label: None,
            legend: Vec::new(),
        }
    }

    pub fn with_axis_label(mut self, label: impl Into<String>) -> Self {
        self.axis_label = Some(label.into());
        self
    }

    pub fn with_legend(mut self, legend: Vec<LegendEntry>) -> Self {
        self.legend = legend;
        self
    }
}

/// Dashboard builder for generating a grid of charts as one SVG document
pub struct DashboardBuilder {
    title: String,
    panels: Vec<Panel>,
}

impl DashboardBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            panels: Vec::new(),
        }
    }

    pub fn add_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    /// Render the complete SVG document
    pub fn build(&self) -> String {
        let rows = self.panels.len().div_ceil(COLUMNS).max(1);
        let width = PANEL_WIDTH * COLUMNS as f64;
        let height = HEADER_HEIGHT + PANEL_HEIGHT * rows as f64;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="38" {FONT} font-size="22" font-weight="bold" text-anchor="middle">{}</text>"#,
            width / 2.0,
            escape(&self.title)
        );

        for (i, panel) in self.panels.iter().enumerate() {
            let x = PANEL_WIDTH * (i % COLUMNS) as f64;
            let y = HEADER_HEIGHT + PANEL_HEIGHT * (i / COLUMNS) as f64;
            let _ = writeln!(svg, r#"<g transform="translate({x},{y})">"#);
            render_panel(&mut svg, panel);
            svg.push_str("</g>\n");
        }

        svg.push_str("</svg>\n");
        svg
    }
}

/// Escape text for use inside SVG elements and attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compact number label: integers without decimals, everything else with one.
fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn plot_area() -> (f64, f64, f64, f64) {
    (
        MARGIN_LEFT,
        MARGIN_TOP,
        PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
        PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
    )
}

fn render_panel(svg: &mut String, panel: &Panel) {
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" {FONT} font-size="15" font-weight="bold" text-anchor="middle">{}</text>"#,
        PANEL_WIDTH / 2.0,
        escape(&panel.title)
    );

    if panel.points.is_empty() || panel.points.iter().all(|p| p.value <= 0.0) {
        let _ = writeln!(
            svg,
            r##"<text x="{}" y="{}" {FONT} font-size="13" fill="#888888" text-anchor="middle">No data</text>"##,
            PANEL_WIDTH / 2.0,
            PANEL_HEIGHT / 2.0
        );
        return;
    }

    match &panel.kind {
        ChartKind::HorizontalBar => render_horizontal_bars(svg, panel),
        ChartKind::VerticalBar { y_max } => render_vertical_bars(svg, panel, *y_max),
        ChartKind::Pie => render_pie(svg, panel),
    }
    render_legend(svg, &panel.legend);
}

fn render_horizontal_bars(svg: &mut String, panel: &Panel) {
    let (left, top, width, height) = plot_area();
    let max = panel.points.iter().map(|p| p.value).fold(0.0, f64::max);
    let band = height / panel.points.len() as f64;

    for (i, point) in panel.points.iter().enumerate() {
        let bar_y = top + band * i as f64 + band * 0.15;
        let bar_h = band * 0.7;
        let bar_w = width * point.value.max(0.0) / max;
        let _ = writeln!(
            svg,
            r#"<rect x="{left}" y="{bar_y:.2}" width="{bar_w:.2}" height="{bar_h:.2}" fill="{}"/>"#,
            point.color
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.2}" {FONT} font-size="11" text-anchor="end" dominant-baseline="middle">{}</text>"#,
            left - 6.0,
            bar_y + bar_h / 2.0,
            escape(&point.label)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" {FONT} font-size="10" dominant-baseline="middle">{}</text>"#,
            left + bar_w + 4.0,
            bar_y + bar_h / 2.0,
            fmt_value(point.value)
        );
    }

    axis_lines(svg);
    if let Some(label) = &panel.axis_label {
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" {FONT} font-size="12" text-anchor="middle">{}</text>"#,
            left + width / 2.0,
            top + height + 35.0,
            escape(label)
        );
    }
}

fn render_vertical_bars(svg: &mut String, panel: &Panel, y_max: Option<f64>) {
    let (left, top, width, height) = plot_area();
    let max = y_max.unwrap_or_else(|| panel.points.iter().map(|p| p.value).fold(0.0, f64::max));
    let band = width / panel.points.len() as f64;
    let baseline = top + height;

    for (i, point) in panel.points.iter().enumerate() {
        let bar_x = left + band * i as f64 + band * 0.15;
        let bar_w = band * 0.7;
        let bar_h = height * (point.value.max(0.0) / max).min(1.0);
        let _ = writeln!(
            svg,
            r#"<rect x="{bar_x:.2}" y="{:.2}" width="{bar_w:.2}" height="{bar_h:.2}" fill="{}"/>"#,
            baseline - bar_h,
            point.color
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" {FONT} font-size="10" text-anchor="middle">{}</text>"#,
            bar_x + bar_w / 2.0,
            baseline - bar_h - 4.0,
            fmt_value(point.value)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" {FONT} font-size="11" text-anchor="middle">{}</text>"#,
            bar_x + bar_w / 2.0,
            baseline + 16.0,
            escape(&point.label)
        );
    }

    axis_lines(svg);
    if let Some(label) = &panel.axis_label {
        let cy = top + height / 2.0;
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{cy}" {FONT} font-size="12" text-anchor="middle" transform="rotate(-90 {} {cy})">{}</text>"#,
            left - 45.0,
            left - 45.0,
            escape(label)
        );
    }
}

fn render_pie(svg: &mut String, panel: &Panel) {
    let (left, top, width, height) = plot_area();
    let radius = width.min(height) / 2.0;
    let cx = left + radius;
    let cy = top + height / 2.0;
    let total: f64 = panel.points.iter().map(|p| p.value.max(0.0)).sum();
    let slices: Vec<&DataPoint> = panel.points.iter().filter(|p| p.value > 0.0).collect();

    let mut start = -PI / 2.0;
    for point in &slices {
        let share = point.value / total;
        let sweep = share * 2.0 * PI;
        if slices.len() == 1 {
            let _ = writeln!(svg, r#"<circle cx="{cx}" cy="{cy}" r="{radius}" fill="{}"/>"#, point.color);
        } else {
            let end = start + sweep;
            let large_arc = if sweep > PI { 1 } else { 0 };
            let _ = writeln!(
                svg,
                r##"<path d="M {cx} {cy} L {:.2} {:.2} A {radius} {radius} 0 {large_arc} 1 {:.2} {:.2} Z" fill="{}" stroke="#ffffff"/>"##,
                cx + radius * start.cos(),
                cy + radius * start.sin(),
                cx + radius * end.cos(),
                cy + radius * end.sin(),
                point.color
            );
        }

        let mid = start + sweep / 2.0;
        let _ = writeln!(
            svg,
            r##"<text x="{:.2}" y="{:.2}" {FONT} font-size="12" fill="#ffffff" text-anchor="middle" dominant-baseline="middle">{:.0}%</text>"##,
            cx + radius * 0.65 * mid.cos(),
            cy + radius * 0.65 * mid.sin(),
            share * 100.0
        );
        start += sweep;
    }

    // Slice labels double as the legend
    let legend_x = cx + radius + 40.0;
    for (i, point) in slices.iter().enumerate() {
        let y = cy - 12.0 * slices.len() as f64 + 24.0 * i as f64;
        let _ = writeln!(
            svg,
            r#"<rect x="{legend_x}" y="{y}" width="14" height="14" fill="{}"/>"#,
            point.color
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" {FONT} font-size="12">{} ({})</text>"#,
            legend_x + 20.0,
            y + 11.0,
            escape(&point.label),
            fmt_value(point.value)
        );
    }
}

fn axis_lines(svg: &mut String) {
    let (left, top, width, height) = plot_area();
    let _ = writeln!(
        svg,
        r#"<line x1="{left}" y1="{top}" x2="{left}" y2="{}" stroke="{AXIS_COLOR}"/>"#,
        top + height
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{left}" y1="{}" x2="{}" y2="{}" stroke="{AXIS_COLOR}"/>"#,
        top + height,
        left + width,
        top + height
    );
}

fn render_legend(svg: &mut String, legend: &[LegendEntry]) {
    let x = PANEL_WIDTH - MARGIN_RIGHT - 150.0;
    let y0 = PANEL_HEIGHT - MARGIN_BOTTOM - 20.0 * legend.len() as f64;
    for (i, entry) in legend.iter().enumerate() {
        let y = y0 + 20.0 * i as f64;
        let _ = writeln!(svg, r#"<rect x="{x}" y="{y}" width="12" height="12" fill="{}"/>"#, entry.color);
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" {FONT} font-size="11">{}</text>"#,
            x + 18.0,
            y + 10.0,
            escape(entry.label)
        );
    }
}
