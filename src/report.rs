//! Diagnosis report: HTML for on-device print preview, PDF for sharing.
//!
//! Both renderings come from the same section list, so a section that is
//! absent from the result (no location, no confidence, no controls) is
//! absent from both.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use printpdf::*;

use crate::models::HydratedResult;

pub const REPORT_TITLE: &str = "Tea Leaf Disease Report";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Cannot write report: {0}")]
    Io(#[from] std::io::Error),
}

/// One headed block of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub heading: &'static str,
    pub lines: Vec<String>,
}

impl ReportSection {
    fn new(heading: &'static str, lines: Vec<String>) -> Self {
        Self { heading, lines }
    }
}

pub fn report_sections(result: &HydratedResult) -> Vec<ReportSection> {
    let prediction = &result.prediction;
    let mut sections = Vec::new();

    let mut diagnosis = vec![format!("Disease: {}", prediction.disease_name)];
    if let Some(pct) = prediction.confidence_percent() {
        diagnosis.push(format!("Confidence: {pct}%"));
    }
    sections.push(ReportSection::new("Diagnosis", diagnosis));

    if !prediction.description.is_empty() {
        sections.push(ReportSection::new(
            "Description",
            vec![prediction.description.clone()],
        ));
    }
    for (label, items) in prediction.control_sections() {
        sections.push(ReportSection::new(label, items.to_vec()));
    }
    if !prediction.note.is_empty() {
        sections.push(ReportSection::new("Note", vec![prediction.note.clone()]));
    }
    if let Some(location) = &result.location {
        let mut lines = vec![location.display_label()];
        if location.reverse_geocode.is_some() {
            lines.push(format!(
                "Coordinates: {:.5}, {:.5}",
                location.latitude, location.longitude
            ));
        }
        sections.push(ReportSection::new("Location", lines));
    }
    if let Some(weather) = &result.weather {
        sections.push(ReportSection::new("Weather", vec![weather.summary()]));
    }
    sections
}

// ═══════════════════════════════════════════════════════════
// HTML
// ═══════════════════════════════════════════════════════════

pub fn render_html(result: &HydratedResult, generated_at: DateTime<Utc>) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{REPORT_TITLE}</title>\n"));
    html.push_str(
        "<style>body{font-family:sans-serif;margin:24px;color:#1b1b1b}\
         h1{color:#2e7d32}h2{color:#388e3c;margin-bottom:4px}\
         img{max-width:100%;border-radius:8px}</style>\n",
    );
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{REPORT_TITLE}</h1>\n"));
    html.push_str(&format!(
        "<p class=\"generated\">Generated {}</p>\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if result.prediction.has_image() {
        html.push_str(&format!(
            "<div class=\"image\"><img src=\"{}\" alt=\"Analyzed leaf\"></div>\n",
            escape_html(&result.prediction.image_reference)
        ));
    }

    for section in report_sections(result) {
        html.push_str(&format!(
            "<section>\n<h2>{}</h2>\n",
            escape_html(section.heading)
        ));
        if section.lines.len() > 1 && is_control(section.heading) {
            html.push_str("<ul>\n");
            for line in &section.lines {
                html.push_str(&format!("<li>{}</li>\n", escape_html(line)));
            }
            html.push_str("</ul>\n");
        } else {
            for line in &section.lines {
                html.push_str(&format!("<p>{}</p>\n", escape_html(line)));
            }
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn is_control(heading: &str) -> bool {
    heading.ends_with("control")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════
// PDF
// ═══════════════════════════════════════════════════════════

const PAGE_W: Mm = Mm(210.0);
const PAGE_H: Mm = Mm(297.0);
const TOP: Mm = Mm(280.0);
const BOTTOM: Mm = Mm(20.0);

/// Render the report as PDF bytes. The leaf image is not embedded.
pub fn render_pdf(result: &HydratedResult, generated_at: DateTime<Utc>) -> Result<Vec<u8>, ReportError> {
    let (doc, page1, layer1) = PdfDocument::new(REPORT_TITLE, PAGE_W, PAGE_H, "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Pdf(format!("font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Pdf(format!("font: {e}")))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = TOP;

    layer.use_text(REPORT_TITLE, 16.0, Mm(20.0), y, &bold);
    y -= Mm(7.0);
    layer.use_text(
        format!("Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC")),
        8.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(10.0);

    for section in report_sections(result) {
        if y < BOTTOM + Mm(12.0) {
            let (page, page_layer) = doc.add_page(PAGE_W, PAGE_H, "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = TOP;
        }
        layer.use_text(section.heading.to_uppercase(), 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);

        let bullet = is_control(section.heading) && section.lines.len() > 1;
        for line in &section.lines {
            let text = if bullet { format!("- {line}") } else { line.clone() };
            for wrapped in wrap_text(&text, 90) {
                if y < BOTTOM {
                    let (page, page_layer) = doc.add_page(PAGE_W, PAGE_H, "Layer 1");
                    layer = doc.get_page(page).get_layer(page_layer);
                    y = TOP;
                }
                layer.use_text(&wrapped, 9.0, Mm(25.0), y, &font);
                y -= Mm(4.5);
            }
        }
        y -= Mm(4.0);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Pdf(format!("save: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::Pdf(format!("buffer: {e}")))
}

/// Write PDF bytes into `exports_dir`, creating it if needed.
pub fn export_pdf_to_file(
    pdf_bytes: &[u8],
    filename: &str,
    exports_dir: &Path,
) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(exports_dir)?;
    let path = exports_dir.join(filename);
    std::fs::write(&path, pdf_bytes)?;
    tracing::info!(path = %path.display(), bytes = pdf_bytes.len(), "Report exported");
    Ok(path)
}

/// `camellia-report-<disease>-<timestamp>.pdf`, filesystem-safe.
pub fn report_filename(result: &HydratedResult, generated_at: DateTime<Utc>) -> String {
    let slug: String = result
        .prediction
        .disease_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "leaf".to_string() } else { slug };
    format!(
        "camellia-report-{slug}-{}.pdf",
        generated_at.format("%Y%m%d-%H%M%S")
    )
}

/// Render and export in one step.
pub fn export_report(
    result: &HydratedResult,
    exports_dir: &Path,
    generated_at: DateTime<Utc>,
) -> Result<PathBuf, ReportError> {
    let bytes = render_pdf(result, generated_at)?;
    export_pdf_to_file(&bytes, &report_filename(result, generated_at), exports_dir)
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, LocationContext, PredictionRecord};
    use chrono::TimeZone;

    fn generated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap()
    }

    fn result(with_location: bool) -> HydratedResult {
        HydratedResult {
            prediction: PredictionRecord {
                disease_name: "Red Rust".into(),
                confidence: None,
                image_reference: String::new(),
                description: "Algal <Cephaleuros> infection on stems & leaves.".into(),
                chemical_controls: vec!["Copper oxychloride 0.25%".into(), "Lime sulphur".into()],
                note: "Improve drainage.".into(),
                ..Default::default()
            },
            location: with_location.then(|| LocationContext {
                latitude: 26.75,
                longitude: 94.21,
                reverse_geocode: Some(Address {
                    city: Some("Jorhat".into()),
                    country: Some("India".into()),
                    ..Default::default()
                }),
            }),
            weather: None,
        }
    }

    #[test]
    fn html_omits_absent_sections() {
        let html = render_html(&result(false), generated());
        assert!(!html.contains("<img"));
        assert!(!html.contains("Location"));
        assert!(!html.contains("Confidence"));
        assert!(!html.contains("Weather"));
        assert!(html.contains("<li>Lime sulphur</li>"));
    }

    #[test]
    fn html_includes_location_and_image_when_present() {
        let mut r = result(true);
        r.prediction.image_reference = "data:image/jpeg;base64,QUJD".into();
        r.prediction.confidence = Some(0.82);
        let html = render_html(&r, generated());
        assert!(html.contains("<img src=\"data:image/jpeg;base64,QUJD\""));
        assert!(html.contains("<h2>Location</h2>"));
        assert!(html.contains("Jorhat, India"));
        assert!(html.contains("Confidence: 82%"));
    }

    #[test]
    fn html_escapes_server_text() {
        let html = render_html(&result(false), generated());
        assert!(html.contains("Algal &lt;Cephaleuros&gt; infection on stems &amp; leaves."));
    }

    #[test]
    fn pdf_has_magic_header() {
        let bytes = render_pdf(&result(true), generated()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_report_spills_onto_more_pages() {
        let mut r = result(false);
        r.prediction.mechanical_controls = (0..120).map(|i| format!("Step {i}: prune and burn")).collect();
        let bytes = render_pdf(&r, generated()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn export_writes_into_exports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("exports");
        let path = export_report(&result(false), &exports, generated()).unwrap();
        assert_eq!(path.parent().unwrap(), exports);
        assert_eq!(
            path.file_name().unwrap(),
            "camellia-report-red-rust-20240610-083000.pdf"
        );
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("one two three four five six", 10);
        assert!(lines.iter().all(|l| l.len() <= 10));
        assert_eq!(lines.join(" "), "one two three four five six");
    }
}
