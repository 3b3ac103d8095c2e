//! PDF report assembly.
//!
//! One artifact per finished analysis: a header with the document name and
//! generation time, a tier-colored score banner, a matched/unique proportion
//! pie, the document text in fixed 20-word lines with the coarse suspect
//! highlight, and the top matching sources with clickable links. Every
//! rendered string passes through Latin-1 folding first; the standard Type1
//! fonts cannot encode anything beyond that range.
//!
//! The suspect highlight is position-based on purpose: when the global score
//! passes the flag threshold, every 3rd line is set in the alert color
//! regardless of where the matches actually were. Tying it to per-chunk
//! match locations would change what end users see.

use copytrace_core::{BlobStore, Error, ReportedSource, Result};
use copytrace_local::chunk::split_words;
use copytrace_local::textprep::latin1_fold;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::io::Write;

const PAGE_W: f32 = 595.0;
const PAGE_H: f32 = 842.0;
const MARGIN: f32 = 50.0;
const CONTENT_W: f32 = PAGE_W - 2.0 * MARGIN;
const FOOTER_Y: f32 = 30.0;

pub const WORDS_PER_LINE: usize = 20;
/// Every `SUSPECT_LINE_STRIDE`th line is flagged once the score passes the
/// flag threshold.
const SUSPECT_LINE_STRIDE: usize = 3;
pub const HIGHLIGHT_FLAG_THRESHOLD: f64 = 20.0;
pub const MAX_REPORTED_SOURCES: usize = 10;

const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const GRAY: (f32, f32, f32) = (0.45, 0.45, 0.45);
const LIGHT_GRAY: (f32, f32, f32) = (0.85, 0.85, 0.85);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);
const LINK_BLUE: (f32, f32, f32) = (0.1, 0.25, 0.7);
const ALERT_RED: (f32, f32, f32) = (0.80, 0.16, 0.13);

/// Three-tier banding of the aggregate score. The boundaries are part of
/// the report contract, not presentation detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Low,
    Medium,
    High,
}

pub fn score_tier(score: f64) -> ScoreTier {
    if score < 15.0 {
        ScoreTier::Low
    } else if score <= 30.0 {
        ScoreTier::Medium
    } else {
        ScoreTier::High
    }
}

impl ScoreTier {
    fn rgb(self) -> (f32, f32, f32) {
        match self {
            ScoreTier::Low => (0.18, 0.62, 0.31),
            ScoreTier::Medium => (0.90, 0.62, 0.09),
            ScoreTier::High => ALERT_RED,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreTier::Low => "low",
            ScoreTier::Medium => "moderate",
            ScoreTier::High => "high",
        }
    }
}

/// Whether a given 20-word line is set in the alert style.
pub fn is_suspect_line(line_index: usize, score: f64) -> bool {
    score > HIGHLIGHT_FLAG_THRESHOLD && line_index % SUSPECT_LINE_STRIDE == SUSPECT_LINE_STRIDE - 1
}

pub struct ReportInput<'a> {
    pub analysis_id: &'a str,
    pub document_name: &'a str,
    pub score: f64,
    /// Deduplicated, already ranked best-first.
    pub sources: &'a [ReportedSource],
    pub text: &'a str,
}

struct PageLink {
    rect: [f32; 4],
    url: String,
}

struct PageDraft {
    ops: Vec<Operation>,
    links: Vec<PageLink>,
}

/// Top-down cursor layout over as many A4 pages as the content needs.
struct Layout {
    done: Vec<PageDraft>,
    ops: Vec<Operation>,
    links: Vec<PageLink>,
    y: f32,
}

fn latin1_literal(s: &str) -> Object {
    let folded = latin1_fold(s);
    Object::String(
        folded.chars().map(|c| c as u8).collect(),
        StringFormat::Literal,
    )
}

fn fill_color(rgb: (f32, f32, f32)) -> Operation {
    Operation::new("rg", vec![rgb.0.into(), rgb.1.into(), rgb.2.into()])
}

fn point(cx: f32, cy: f32, r: f32, deg: f32) -> (f32, f32) {
    let a = deg.to_radians();
    (cx + r * a.cos(), cy + r * a.sin())
}

/// Filled pie slice from `start_deg` sweeping `sweep_deg` (negative for
/// clockwise), arc approximated by cubic Beziers of at most 90 degrees.
fn pie_slice(cx: f32, cy: f32, r: f32, start_deg: f32, sweep_deg: f32, rgb: (f32, f32, f32)) -> Vec<Operation> {
    let mut ops = vec![
        fill_color(rgb),
        Operation::new("m", vec![cx.into(), cy.into()]),
    ];
    let (sx, sy) = point(cx, cy, r, start_deg);
    ops.push(Operation::new("l", vec![sx.into(), sy.into()]));

    let segments = (sweep_deg.abs() / 90.0).ceil().max(1.0) as usize;
    let step = sweep_deg / segments as f32;
    let mut a0 = start_deg;
    for _ in 0..segments {
        let a1 = a0 + step;
        let (x0, y0) = point(cx, cy, r, a0);
        let (x1, y1) = point(cx, cy, r, a1);
        let k = (4.0 / 3.0) * (step.to_radians() / 4.0).tan() * r;
        let (t0x, t0y) = (-a0.to_radians().sin(), a0.to_radians().cos());
        let (t1x, t1y) = (-a1.to_radians().sin(), a1.to_radians().cos());
        ops.push(Operation::new(
            "c",
            vec![
                (x0 + k * t0x).into(),
                (y0 + k * t0y).into(),
                (x1 - k * t1x).into(),
                (y1 - k * t1y).into(),
                x1.into(),
                y1.into(),
            ],
        ));
        a0 = a1;
    }
    ops.push(Operation::new("h", vec![]));
    ops.push(Operation::new("f", vec![]));
    ops
}

impl Layout {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            ops: Vec::new(),
            links: Vec::new(),
            y: PAGE_H - MARGIN,
        }
    }

    fn finish_page(&mut self) {
        let mut ops = std::mem::take(&mut self.ops);
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec!["F1".into(), 8.into()]));
        ops.push(fill_color(GRAY));
        ops.push(Operation::new("Td", vec![MARGIN.into(), FOOTER_Y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![latin1_literal("copytrace - automated similarity screening")],
        ));
        ops.push(Operation::new("ET", vec![]));
        self.done.push(PageDraft {
            ops,
            links: std::mem::take(&mut self.links),
        });
        self.y = PAGE_H - MARGIN;
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.y - needed < MARGIN {
            self.finish_page();
        }
    }

    fn gap(&mut self, h: f32) {
        self.y -= h;
    }

    fn text_at(&mut self, x: f32, y: f32, font: &str, size: i64, rgb: (f32, f32, f32), s: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops.push(fill_color(rgb));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new("Tj", vec![latin1_literal(s)]));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn line(&mut self, font: &str, size: i64, rgb: (f32, f32, f32), s: &str) {
        let advance = size as f32 * 1.4;
        self.ensure_room(advance);
        self.y -= advance;
        let y = self.y;
        self.text_at(MARGIN, y, font, size, rgb, s);
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: (f32, f32, f32)) {
        self.ops.push(fill_color(rgb));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), w.into(), h.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn banner(&mut self, score: f64) {
        let tier = score_tier(score);
        self.ensure_room(48.0);
        self.y -= 44.0;
        let y = self.y;
        self.rect(MARGIN, y, CONTENT_W, 40.0, tier.rgb());
        self.text_at(
            MARGIN + 12.0,
            y + 14.0,
            "F2",
            16,
            WHITE,
            &format!("Overall similarity: {score:.1}% ({} risk)", tier.label()),
        );
    }

    fn proportion_chart(&mut self, score: f64) {
        const BLOCK_H: f32 = 150.0;
        const R: f32 = 60.0;
        self.ensure_room(BLOCK_H);
        let cx = MARGIN + R + 10.0;
        let cy = self.y - BLOCK_H / 2.0;

        // Whole disc is the "unique" share; the matched slice covers it
        // clockwise from 12 o'clock.
        self.ops.extend(pie_slice(cx, cy, R, 90.0, -360.0, LIGHT_GRAY));
        let matched = (score / 100.0).clamp(0.0, 1.0) as f32;
        if matched > 0.0 {
            self.ops.extend(pie_slice(
                cx,
                cy,
                R,
                90.0,
                -360.0 * matched,
                score_tier(score).rgb(),
            ));
        }

        let legend_x = cx + R + 40.0;
        self.rect(legend_x, cy + 16.0, 9.0, 9.0, score_tier(score).rgb());
        self.text_at(
            legend_x + 14.0,
            cy + 17.0,
            "F1",
            10,
            BLACK,
            &format!("Matched {score:.1}%"),
        );
        self.rect(legend_x, cy - 8.0, 9.0, 9.0, LIGHT_GRAY);
        self.text_at(
            legend_x + 14.0,
            cy - 7.0,
            "F1",
            10,
            BLACK,
            &format!("Unique {:.1}%", 100.0 - score),
        );
        self.y -= BLOCK_H;
    }

    fn source_entry(&mut self, index: usize, source: &ReportedSource) {
        self.line(
            "F2",
            10,
            BLACK,
            &format!("{}. {:.1}% - {}", index + 1, source.similarity, source.label()),
        );
        self.line("F1", 9, LINK_BLUE, &source.url);
        // Approximate Helvetica advance; good enough for a click target.
        let w = (source.url.chars().count() as f32 * 9.0 * 0.5).min(CONTENT_W);
        self.links.push(PageLink {
            rect: [MARGIN, self.y - 2.0, MARGIN + w, self.y + 10.0],
            url: source.url.clone(),
        });
    }
}

fn layout(input: &ReportInput<'_>) -> Vec<PageDraft> {
    let mut l = Layout::new();

    l.line("F2", 18, BLACK, "Plagiarism analysis report");
    let generated = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");
    l.line(
        "F1",
        10,
        GRAY,
        &format!("{} - generated {generated}", input.document_name),
    );
    l.gap(10.0);
    l.banner(input.score);
    l.gap(16.0);
    l.proportion_chart(input.score);
    l.gap(10.0);

    l.line("F2", 12, BLACK, "Document text");
    l.gap(4.0);
    for (i, line) in split_words(input.text, WORDS_PER_LINE).iter().enumerate() {
        let rgb = if is_suspect_line(i, input.score) {
            ALERT_RED
        } else {
            BLACK
        };
        l.line("F1", 7, rgb, line);
    }

    l.gap(14.0);
    l.line("F2", 12, BLACK, "Top matching sources");
    l.gap(4.0);
    if input.sources.is_empty() {
        l.line("F1", 9, GRAY, "No sources above the relevance threshold.");
    }
    for (i, source) in input.sources.iter().take(MAX_REPORTED_SOURCES).enumerate() {
        l.source_entry(i, source);
        l.gap(4.0);
    }

    l.finish_page();
    l.done
}

pub fn render_pdf(input: &ReportInput<'_>) -> Result<Vec<u8>> {
    let drafts = layout(input);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let font_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_regular, "F2" => font_bold },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        let content = Content {
            operations: draft.ops.clone(),
        };
        let encoded = content.encode().map_err(|e| Error::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !draft.links.is_empty() {
            let annots: Vec<Object> = draft
                .links
                .iter()
                .map(|l| {
                    Object::Dictionary(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Link",
                        "Rect" => vec![
                            l.rect[0].into(),
                            l.rect[1].into(),
                            l.rect[2].into(),
                            l.rect[3].into(),
                        ],
                        "Border" => vec![0.into(), 0.into(), 0.into()],
                        "A" => dictionary! {
                            "S" => "URI",
                            "URI" => Object::string_literal(l.url.as_str()),
                        },
                    })
                })
                .collect();
            page.set("Annots", annots);
        }
        kids.push(doc.add_object(page).into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_W.into(), PAGE_H.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| Error::Render(e.to_string()))?;
    Ok(out)
}

/// Render, stage to a transient file, upload, and return the blob path.
///
/// The staged file must never outlive the call; `NamedTempFile` removes it
/// on success and on every failure path alike.
pub async fn generate_and_store(blobs: &dyn BlobStore, input: &ReportInput<'_>) -> Result<String> {
    let bytes = render_pdf(input)?;

    let mut staged = tempfile::NamedTempFile::new().map_err(|e| Error::Render(e.to_string()))?;
    staged
        .write_all(&bytes)
        .map_err(|e| Error::Render(e.to_string()))?;
    staged.flush().map_err(|e| Error::Render(e.to_string()))?;
    let payload = std::fs::read(staged.path()).map_err(|e| Error::Render(e.to_string()))?;

    let path = format!("reports/{}.pdf", input.analysis_id);
    blobs.upload(&path, payload, "application/pdf").await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sample_sources() -> Vec<ReportedSource> {
        vec![
            ReportedSource {
                url: "https://example.com/article".to_string(),
                title: Some("Example article".to_string()),
                similarity: 44.5,
            },
            ReportedSource {
                url: "https://example.org/page".to_string(),
                title: None,
                similarity: 21.0,
            },
        ]
    }

    #[test]
    fn banner_tiers_follow_the_documented_thresholds() {
        assert_eq!(score_tier(10.0), ScoreTier::Low);
        assert_eq!(score_tier(14.99), ScoreTier::Low);
        assert_eq!(score_tier(15.0), ScoreTier::Medium);
        assert_eq!(score_tier(20.0), ScoreTier::Medium);
        assert_eq!(score_tier(30.0), ScoreTier::Medium);
        assert_eq!(score_tier(30.01), ScoreTier::High);
        assert_eq!(score_tier(35.0), ScoreTier::High);
    }

    #[test]
    fn every_third_line_is_suspect_only_above_the_flag_threshold() {
        for i in 0..9 {
            assert!(!is_suspect_line(i, 20.0), "line {i} flagged at score 20");
        }
        assert!(!is_suspect_line(0, 25.0));
        assert!(!is_suspect_line(1, 25.0));
        assert!(is_suspect_line(2, 25.0));
        assert!(is_suspect_line(5, 25.0));
        assert!(!is_suspect_line(6, 25.0));
    }

    #[test]
    fn rendered_report_is_a_readable_pdf() {
        let sources = sample_sources();
        let input = ReportInput {
            analysis_id: "an-1",
            document_name: "essay.pdf",
            score: 34.5,
            sources: &sources,
            text: "The quick brown fox jumps over the lazy dog repeatedly.",
        };
        let bytes = render_pdf(&input).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let text = copytrace_local::extract::pdf_to_text(&bytes).unwrap();
        assert!(text.contains("essay.pdf"), "missing header in {text:?}");
        assert!(text.contains("34.5%"), "missing score in {text:?}");
        assert!(text.contains("Example article"), "missing source in {text:?}");
        assert!(text.contains("quick brown fox"), "missing body in {text:?}");
    }

    #[test]
    fn typographic_punctuation_is_folded_before_rendering() {
        let input = ReportInput {
            analysis_id: "an-2",
            document_name: "notes.pdf",
            score: 5.0,
            sources: &[],
            text: "It\u{2019}s \u{201C}quoted\u{201D} text \u{2014} with dashes",
        };
        let bytes = render_pdf(&input).unwrap();
        let text = copytrace_local::extract::pdf_to_text(&bytes).unwrap();
        assert!(text.contains("It's"), "got {text:?}");
        assert!(text.contains("\"quoted\""), "got {text:?}");
    }

    #[test]
    fn long_documents_flow_across_pages() {
        let body = (0..4000).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let input = ReportInput {
            analysis_id: "an-3",
            document_name: "thesis.pdf",
            score: 12.0,
            sources: &[],
            text: &body,
        };
        let bytes = render_pdf(&input).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 2, "pages: {}", doc.get_pages().len());
    }

    struct CaptureBlobs {
        uploads: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    }

    #[async_trait::async_trait]
    impl BlobStore for CaptureBlobs {
        async fn download(&self, path: &str) -> Result<Vec<u8>> {
            Err(Error::Storage(format!("unexpected download of {path}")))
        }

        async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
            self.uploads
                .lock()
                .unwrap()
                .push((path.to_string(), content_type.to_string(), bytes));
            Ok(())
        }
    }

    #[tokio::test]
    async fn generated_report_lands_at_the_derived_blob_path() {
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let blobs = CaptureBlobs {
            uploads: uploads.clone(),
        };
        let sources = sample_sources();
        let input = ReportInput {
            analysis_id: "an-9",
            document_name: "essay.pdf",
            score: 18.0,
            sources: &sources,
            text: "some document body text",
        };

        let path = generate_and_store(&blobs, &input).await.unwrap();
        assert_eq!(path, "reports/an-9.pdf");

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "reports/an-9.pdf");
        assert_eq!(uploads[0].1, "application/pdf");
        assert!(uploads[0].2.starts_with(b"%PDF-"));
    }
}
