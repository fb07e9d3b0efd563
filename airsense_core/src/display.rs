//! Paginated status screen.
//!
//! Each page is a list of line templates parsed once at startup. A template
//! mixes literal text with field tokens:
//!
//! | token | value |
//! |---|---|
//! | `{temperature:P}` / `{humidity:P}` | climate values, `P` decimals |
//! | `{resistance:P}` | sensor resistance |
//! | `{gas:NAME:P}` | concentration of a registered gas |
//! | `{adc}` | raw code |
//! | `{status}` | air-quality label |
//! | `{page}` / `{pages}` | 1-based page number and page count |
//!
//! `P` is optional (default 0). Missing values render as `--`.

use airsense_traits::{BoxError, Display};
use tracing::warn;

use crate::error::AirError;
use crate::estimator::GasTable;
use crate::reading::Reading;

/// Pixel width of one character cell.
const CHAR_PX: i32 = 8;
/// Baseline row for single-message screens.
const MESSAGE_Y: i32 = 28;
/// Where the transport notice goes; left of the page indicator.
const NOTICE_POS: (i32, i32) = (0, 55);
const MISSING: &str = "--";

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Temperature(usize),
    Humidity(usize),
    Resistance(usize),
    Gas { name: String, precision: usize },
    Adc,
    Status,
    Page,
    Pages,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Field),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSpec {
    segments: Vec<Segment>,
    pub x: i32,
    pub y: i32,
}

fn parse_precision(token: &str, p: Option<&str>) -> Result<usize, AirError> {
    match p {
        None => Ok(0),
        Some(s) => s
            .parse::<usize>()
            .ok()
            .filter(|p| *p <= 6)
            .ok_or_else(|| AirError::Config(format!("bad precision in {{{token}}}"))),
    }
}

fn parse_field(token: &str, gases: &GasTable) -> Result<Field, AirError> {
    let mut parts = token.split(':');
    let head = parts.next().unwrap_or_default();
    let field = match head {
        "temperature" => Field::Temperature(parse_precision(token, parts.next())?),
        "humidity" => Field::Humidity(parse_precision(token, parts.next())?),
        "resistance" => Field::Resistance(parse_precision(token, parts.next())?),
        "gas" => {
            let name = parts
                .next()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| AirError::Config(format!("missing gas name in {{{token}}}")))?;
            if !gases.contains(name) {
                return Err(AirError::Config(format!(
                    "display references unknown gas {name:?}"
                )));
            }
            Field::Gas {
                name: name.to_string(),
                precision: parse_precision(token, parts.next())?,
            }
        }
        "adc" => Field::Adc,
        "status" => Field::Status,
        "page" => Field::Page,
        "pages" => Field::Pages,
        _ => return Err(AirError::Config(format!("unknown display field {{{token}}}"))),
    };
    if parts.next().is_some() {
        return Err(AirError::Config(format!("trailing arguments in {{{token}}}")));
    }
    Ok(field)
}

impl LineSpec {
    pub fn parse(template: &str, x: i32, y: i32, gases: &GasTable) -> Result<Self, AirError> {
        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| AirError::Config(format!("unterminated field in {template:?}")))?;
            segments.push(Segment::Field(parse_field(&after[..close], gases)?));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments, x, y })
    }

    fn render(&self, reading: &Reading, page: PageState) -> String {
        let fixed = |v: Option<f64>, p: usize| match v {
            Some(v) if v.is_finite() => format!("{v:.p$}"),
            _ => MISSING.to_string(),
        };
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(f) => out.push_str(&match f {
                    Field::Temperature(p) => fixed(reading.temperature_c, *p),
                    Field::Humidity(p) => fixed(reading.humidity_pct, *p),
                    Field::Resistance(p) => fixed(Some(reading.resistance), *p),
                    Field::Gas { name, precision } => {
                        fixed(reading.concentrations.get(name), *precision)
                    }
                    Field::Adc => reading.adc.to_string(),
                    Field::Status => reading.status.label().to_string(),
                    Field::Page => (page.index() + 1).to_string(),
                    Field::Pages => page.count().to_string(),
                }),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    pub lines: Vec<LineSpec>,
}

/// Current page; always `index < count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    index: usize,
    count: usize,
}

impl PageState {
    pub fn new(count: usize) -> Self {
        Self {
            index: 0,
            count: count.max(1),
        }
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn count(self) -> usize {
        self.count
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self {
            index: (self.index + 1) % self.count,
            count: self.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayPresenter {
    pages: Vec<PageLayout>,
    width_chars: usize,
}

fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

fn display_err(e: &(dyn std::error::Error + 'static)) -> AirError {
    AirError::Display(e.to_string())
}

impl DisplayPresenter {
    pub fn new(pages: Vec<PageLayout>, width_chars: usize) -> Result<Self, AirError> {
        if pages.is_empty() {
            return Err(AirError::Config("display needs at least one page".into()));
        }
        if width_chars == 0 {
            return Err(AirError::Config("display width must be >= 1".into()));
        }
        Ok(Self { pages, width_chars })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Fresh page state for this layout, starting at page 1.
    pub fn initial_page(&self) -> PageState {
        PageState::new(self.pages.len())
    }

    /// Lines of the current page and the page to show next cycle.
    pub fn render(&self, reading: &Reading, page: PageState) -> (Vec<RenderedLine>, PageState) {
        let idx = page.index().min(self.pages.len() - 1);
        let lines = self.pages[idx]
            .lines
            .iter()
            .map(|l| RenderedLine {
                text: truncate(&l.render(reading, page), self.width_chars),
                x: l.x,
                y: l.y,
            })
            .collect();
        (lines, page.next())
    }

    /// Clear, draw every line (plus an optional notice), flush.
    pub fn present<D: Display + ?Sized>(
        &self,
        display: &mut D,
        lines: &[RenderedLine],
        notice: Option<&str>,
    ) -> Result<(), AirError> {
        self.draw_frame(display, lines, notice).map_err(|e| {
            let err = display_err(e.as_ref());
            warn!(error = %err, "display update failed");
            err
        })
    }

    fn draw_frame<D: Display + ?Sized>(
        &self,
        display: &mut D,
        lines: &[RenderedLine],
        notice: Option<&str>,
    ) -> Result<(), BoxError> {
        display.clear()?;
        for l in lines {
            display.draw_text(&l.text, l.x, l.y)?;
        }
        if let Some(n) = notice {
            display.draw_text(&truncate(n, self.width_chars), NOTICE_POS.0, NOTICE_POS.1)?;
        }
        display.flush()
    }

    /// Full-screen single message, roughly centered.
    pub fn show_message<D: Display + ?Sized>(
        &self,
        display: &mut D,
        text: &str,
    ) -> Result<(), AirError> {
        let text = truncate(text, self.width_chars);
        let pad = self.width_chars.saturating_sub(text.chars().count()) / 2;
        let x = i32::try_from(pad).unwrap_or(0) * CHAR_PX;
        let line = RenderedLine {
            text,
            x,
            y: MESSAGE_Y,
        };
        self.present(display, std::slice::from_ref(&line), None)
    }
}
