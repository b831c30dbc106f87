//! Snapshot rendering: a surface is rasterised and embedded in a one-page
//! landscape PDF.

use crate::error::ExportError;
use crate::types::{saturating_sum, CrossTab, MonthlySeries, ReportModel};
use crate::util::format_number;
use once_cell::sync::Lazy;
use resvg::{tiny_skia, usvg};
use flate2::{write::ZlibEncoder, Compression};
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;

/// A4 landscape in PDF points.
pub const PAGE_WIDTH_PT: f64 = 842.0;
pub const PAGE_HEIGHT_PT: f64 = 595.0;
pub const PAGE_MARGIN_PT: f64 = 24.0;

const CANVAS_WIDTH: f64 = 1200.0;
const CANVAS_HEIGHT: f64 = 800.0;
const PANEL_WIDTH: f64 = 600.0;
const PANEL_HEIGHT: f64 = 400.0;
const PLOT_LEFT: f64 = 56.0;
const PLOT_TOP: f64 = 56.0;
const PLOT_WIDTH: f64 = 500.0;
const PLOT_HEIGHT: f64 = 290.0;

static FONTS: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Opaque RGB pixels, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Anything that can be turned into pixels for the snapshot document.
pub trait RenderSurface: Send + Sync {
    fn rasterize(&self) -> Result<Raster, ExportError>;
}

#[derive(Debug, Clone)]
pub struct SvgSurface {
    markup: String,
    scale: f32,
}

impl SvgSurface {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }
}

impl RenderSurface for SvgSurface {
    fn rasterize(&self) -> Result<Raster, ExportError> {
        rasterize_svg(&self.markup, self.scale)
    }
}

pub fn rasterize_svg(svg: &str, scale: f32) -> Result<Raster, ExportError> {
    let mut options = usvg::Options::default();
    options.fontdb = FONTS.clone();

    let tree = usvg::Tree::from_data(svg.as_bytes(), &options)
        .map_err(|err| ExportError::Raster(format!("SVG parse failed: {err}")))?;
    let size = tree
        .size()
        .to_int_size()
        .scale_by(scale)
        .ok_or_else(|| ExportError::Raster("surface has no area".to_string()))?;

    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| ExportError::Raster("pixmap allocation failed".to_string()))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    // Premultiplied RGBA over white.
    let mut rgb = Vec::with_capacity((size.width() * size.height() * 3) as usize);
    for px in pixmap.data().chunks_exact(4) {
        let backdrop = 255 - px[3];
        rgb.extend([
            px[0].saturating_add(backdrop),
            px[1].saturating_add(backdrop),
            px[2].saturating_add(backdrop),
        ]);
    }
    Ok(Raster {
        width: size.width(),
        height: size.height(),
        rgb,
    })
}

/// Where the image lands on the page, in points from the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub fn fit_to_page(width: u32, height: u32) -> Placement {
    let avail_w = PAGE_WIDTH_PT - 2.0 * PAGE_MARGIN_PT;
    let avail_h = PAGE_HEIGHT_PT - 2.0 * PAGE_MARGIN_PT;
    let scale = (avail_w / f64::from(width.max(1))).min(avail_h / f64::from(height.max(1)));
    let (w, h) = (f64::from(width) * scale, f64::from(height) * scale);
    Placement {
        x: (PAGE_WIDTH_PT - w) / 2.0,
        y: (PAGE_HEIGHT_PT - h) / 2.0,
        width: w,
        height: h,
    }
}

/// One-page PDF holding `raster` as a zlib-compressed RGB image XObject.
pub fn compose_snapshot_pdf(raster: &Raster) -> Result<Vec<u8>, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raster.rgb)?;
    let pixels = encoder.finish()?;

    let place = fit_to_page(raster.width, raster.height);
    let content = format!(
        "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im0 Do Q",
        place.width, place.height, place.x, place.y
    );

    let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(5);

    let mut object = |out: &mut Vec<u8>, body: &[u8]| {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", offsets.len()).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    };

    object(&mut out, b"<< /Type /Catalog /Pages 2 0 R >>");
    object(&mut out, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    object(
        &mut out,
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>",
            PAGE_WIDTH_PT, PAGE_HEIGHT_PT
        )
        .as_bytes(),
    );
    let mut image = format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} \
         /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream\n",
        raster.width,
        raster.height,
        pixels.len()
    )
    .into_bytes();
    image.extend_from_slice(&pixels);
    image.extend_from_slice(b"\nendstream");
    object(&mut out, &image);
    object(
        &mut out,
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content).as_bytes(),
    );

    let xref_at = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1);
    for off in &offsets {
        let _ = writeln!(xref, "{off:010} 00000 n ");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        offsets.len() + 1,
        xref_at
    );
    out.extend_from_slice(xref.as_bytes());
    Ok(out)
}

/// Rasterise a surface and wrap it in the snapshot document.
pub fn compose_snapshot(surface: &dyn RenderSurface) -> Result<Vec<u8>, ExportError> {
    let raster = surface.rasterize()?;
    compose_snapshot_pdf(&raster)
}

/// The four dashboard panels drawn from a `ReportModel`.
#[derive(Debug, Clone)]
pub struct DashboardSurface {
    svg: SvgSurface,
}

impl DashboardSurface {
    pub fn from_model(model: &ReportModel) -> Self {
        Self {
            svg: SvgSurface::new(dashboard_svg(model)).with_scale(1.5),
        }
    }

    pub fn markup(&self) -> &str {
        self.svg.markup()
    }
}

impl RenderSurface for DashboardSurface {
    fn rasterize(&self) -> Result<Raster, ExportError> {
        self.svg.rasterize()
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn dashboard_svg(model: &ReportModel) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{CANVAS_WIDTH}" height="{CANVAS_HEIGHT}" viewBox="0 0 {CANVAS_WIDTH} {CANVAS_HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#f3f4f6"/>"##);

    let panels: [(&str, f64, f64); 4] = [
        ("Monthly requests and closures", 0.0, 0.0),
        ("Departments, latest month", PANEL_WIDTH, 0.0),
        ("Closure rate trend", 0.0, PANEL_HEIGHT),
        ("Status distribution", PANEL_WIDTH, PANEL_HEIGHT),
    ];
    for (idx, (title, x, y)) in panels.iter().enumerate() {
        let _ = writeln!(svg, r#"<g transform="translate({x} {y})">"#);
        let _ = writeln!(
            svg,
            r##"<rect x="12" y="12" width="{}" height="{}" rx="12" fill="#ffffff"/>"##,
            PANEL_WIDTH - 24.0,
            PANEL_HEIGHT - 24.0
        );
        let _ = writeln!(
            svg,
            r##"<text x="32" y="44" font-size="18" font-weight="600" fill="#1f2937">{}</text>"##,
            escape(title)
        );
        match idx {
            0 => monthly_panel(&mut svg, &model.monthly_series),
            1 => department_panel(&mut svg, &model.cross_tab),
            2 => rate_panel(&mut svg, &model.monthly_series),
            _ => distribution_panel(&mut svg, &model.cross_tab),
        }
        let _ = writeln!(svg, "</g>");
    }
    let _ = writeln!(svg, "</svg>");
    svg
}

fn no_data(svg: &mut String) {
    let _ = writeln!(
        svg,
        r##"<text x="{}" y="{}" font-size="16" fill="#9ca3af" text-anchor="middle">No data</text>"##,
        PANEL_WIDTH / 2.0,
        PANEL_HEIGHT / 2.0
    );
}

fn axis(svg: &mut String) {
    let base = PLOT_TOP + PLOT_HEIGHT;
    let _ = writeln!(
        svg,
        r##"<line x1="{PLOT_LEFT}" y1="{base}" x2="{}" y2="{base}" stroke="#d1d5db"/>"##,
        PLOT_LEFT + PLOT_WIDTH
    );
}

fn x_labels<'a>(svg: &mut String, labels: impl Iterator<Item = &'a str>, slot: f64) {
    for (i, label) in labels.enumerate() {
        let cx = PLOT_LEFT + slot * (i as f64 + 0.5);
        let cy = PLOT_TOP + PLOT_HEIGHT + 16.0;
        let _ = writeln!(
            svg,
            r##"<text x="{cx:.1}" y="{cy:.1}" font-size="10" fill="#4b5563" text-anchor="end" transform="rotate(-45 {cx:.1} {cy:.1})">{}</text>"##,
            escape(label)
        );
    }
}

fn monthly_panel(svg: &mut String, series: &MonthlySeries) {
    if series.is_empty() {
        return no_data(svg);
    }
    let max = series
        .points
        .iter()
        .map(|p| p.requests.max(p.closed))
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let slot = PLOT_WIDTH / series.len() as f64;
    let y_of = |v: u64| PLOT_TOP + PLOT_HEIGHT - v as f64 / max * PLOT_HEIGHT;

    axis(svg);
    for (i, p) in series.points.iter().enumerate() {
        let x = PLOT_LEFT + slot * i as f64 + slot * 0.2;
        let y = y_of(p.closed);
        let _ = writeln!(
            svg,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{:.1}" height="{:.1}" rx="4" fill="rgb(53,162,235)" fill-opacity="0.5"/>"#,
            slot * 0.6,
            PLOT_TOP + PLOT_HEIGHT - y
        );
    }
    let points: Vec<String> = series
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{:.1},{:.1}", PLOT_LEFT + slot * (i as f64 + 0.5), y_of(p.requests)))
        .collect();
    let _ = writeln!(
        svg,
        r#"<polyline points="{}" fill="none" stroke="rgb(255,99,132)" stroke-width="2"/>"#,
        points.join(" ")
    );
    x_labels(svg, series.points.iter().map(|p| p.month.as_str()), slot);
}

fn department_panel(svg: &mut String, tab: &CrossTab) {
    if tab.is_empty() {
        return no_data(svg);
    }
    let totals = tab.department_totals();
    let max = totals.iter().copied().max().unwrap_or(0).max(1) as f64;
    let slot = PLOT_WIDTH / tab.departments.len() as f64;

    axis(svg);
    for (d, row) in tab.counts.iter().enumerate() {
        let x = PLOT_LEFT + slot * d as f64 + slot * 0.15;
        let mut top = PLOT_TOP + PLOT_HEIGHT;
        for (s, count) in row.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let h = *count as f64 / max * PLOT_HEIGHT;
            top -= h;
            let color = tab.colors[s];
            let _ = writeln!(
                svg,
                r#"<rect x="{x:.1}" y="{top:.1}" width="{:.1}" height="{h:.1}" fill="{}" fill-opacity="{}"/>"#,
                slot * 0.7,
                color.to_hex(),
                color.opacity()
            );
        }
    }
    x_labels(svg, tab.departments.iter().map(String::as_str), slot);
}

fn rate_panel(svg: &mut String, series: &MonthlySeries) {
    if series.is_empty() {
        return no_data(svg);
    }
    let slot = PLOT_WIDTH / series.len() as f64;
    axis(svg);
    let points: Vec<String> = series
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let y = PLOT_TOP + PLOT_HEIGHT - p.closure_rate / 100.0 * PLOT_HEIGHT;
            format!("{:.1},{:.1}", PLOT_LEFT + slot * (i as f64 + 0.5), y)
        })
        .collect();
    let _ = writeln!(
        svg,
        r#"<polyline points="{}" fill="none" stroke="rgb(75,192,192)" stroke-width="2"/>"#,
        points.join(" ")
    );
    if let Some(last) = series.points.last() {
        let _ = writeln!(
            svg,
            r##"<text x="{}" y="{}" font-size="12" fill="#374151" text-anchor="end">{}% latest</text>"##,
            PLOT_LEFT + PLOT_WIDTH,
            PLOT_TOP - 4.0,
            format_number(last.closure_rate, 2)
        );
    }
    x_labels(svg, series.points.iter().map(|p| p.month.as_str()), slot);
}

fn distribution_panel(svg: &mut String, tab: &CrossTab) {
    let totals = tab.status_totals();
    let sum = saturating_sum(totals.iter().copied());
    if sum == 0 {
        return no_data(svg);
    }
    let (cx, cy, r) = (200.0, 210.0, 110.0);
    let circumference = 2.0 * std::f64::consts::PI * r;
    let mut offset = 0.0;
    for (s, total) in totals.iter().enumerate() {
        if *total == 0 {
            continue;
        }
        let len = *total as f64 / sum as f64 * circumference;
        let color = tab.colors[s];
        let _ = writeln!(
            svg,
            r#"<circle cx="{cx}" cy="{cy}" r="{r}" fill="none" stroke="{}" stroke-opacity="{}" stroke-width="60" stroke-dasharray="{len:.2} {:.2}" stroke-dashoffset="{:.2}" transform="rotate(-90 {cx} {cy})"/>"#,
            color.to_hex(),
            color.opacity(),
            circumference - len,
            -offset
        );
        offset += len;
    }
    for (s, status) in tab.statuses.iter().enumerate() {
        let y = 90.0 + 24.0 * s as f64;
        let color = tab.colors[s];
        let _ = writeln!(
            svg,
            r#"<rect x="380" y="{:.1}" width="14" height="14" fill="{}" fill-opacity="{}"/>"#,
            y - 11.0,
            color.to_hex(),
            color.opacity()
        );
        let _ = writeln!(
            svg,
            r##"<text x="402" y="{y:.1}" font-size="13" fill="#374151">{} ({})</text>"##,
            escape(status),
            totals[s]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20"><rect x="0" y="0" width="20" height="20" fill="#ff0000"/></svg>"##;

    #[test]
    fn svg_rasterises_over_white() {
        let raster = SvgSurface::new(SQUARE).rasterize().unwrap();
        assert_eq!((raster.width, raster.height), (40, 20));
        assert_eq!(raster.rgb.len(), 40 * 20 * 3);
        assert_eq!(&raster.rgb[0..3], &[255, 0, 0]);
        let last = raster.rgb.len() - 3;
        assert_eq!(&raster.rgb[last..], &[255, 255, 255]);
    }

    #[test]
    fn bad_markup_is_a_raster_error() {
        let err = SvgSurface::new("<not svg").rasterize().unwrap_err();
        assert!(matches!(err, ExportError::Raster(_)));
    }

    #[test]
    fn wide_images_fill_the_page_width() {
        let place = fit_to_page(2000, 500);
        assert!((place.width - (PAGE_WIDTH_PT - 2.0 * PAGE_MARGIN_PT)).abs() < 1e-9);
        assert!((place.width / place.height - 4.0).abs() < 1e-9);
        assert!((place.y * 2.0 + place.height - PAGE_HEIGHT_PT).abs() < 1e-9);
    }

    #[test]
    fn tall_images_fill_the_page_height() {
        let place = fit_to_page(300, 900);
        assert!((place.height - (PAGE_HEIGHT_PT - 2.0 * PAGE_MARGIN_PT)).abs() < 1e-9);
        assert!(place.x > PAGE_MARGIN_PT);
    }

    #[test]
    fn pdf_has_one_landscape_page() {
        let raster = Raster {
            width: 2,
            height: 1,
            rgb: vec![0, 0, 0, 255, 255, 255],
        };
        let pdf = compose_snapshot_pdf(&raster).unwrap();
        let text = String::from_utf8_lossy(&pdf);
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/MediaBox [0 0 842 595]"));
        assert!(text.contains("/Width 2 /Height 1"));
        assert!(text.contains("/Filter /FlateDecode"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn image_stream_is_deflated() {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let raster = Raster {
            width: 1800,
            height: 1200,
            rgb: vec![255; 1800 * 1200 * 3],
        };
        let pdf = compose_snapshot_pdf(&raster).unwrap();
        assert!(pdf.len() < raster.rgb.len() / 50);

        let start = pdf.windows(7).position(|w| w == b"stream\n").unwrap() + 7;
        let mut inflated = Vec::new();
        ZlibDecoder::new(&pdf[start..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, raster.rgb);
    }

    #[test]
    fn dashboard_escapes_labels_and_marks_empty_panels() {
        let empty = DashboardSurface::from_model(&ReportModel::empty());
        assert_eq!(empty.markup().matches("No data").count(), 4);

        let model = ReportModel {
            latest_month: Some("2024-01".into()),
            cross_tab: CrossTab {
                departments: vec!["R&D".into()],
                statuses: vec!["요청".into()],
                colors: vec![crate::palette::status_color("요청")],
                counts: vec![vec![3]],
            },
            ..Default::default()
        };
        let markup = DashboardSurface::from_model(&model).markup().to_string();
        assert!(markup.contains("R&amp;D"));
        assert!(!markup.contains("R&D"));
        assert_eq!(markup.matches("No data").count(), 2);
    }
}
