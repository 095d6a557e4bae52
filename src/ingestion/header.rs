//! Header resolution.
//!
//! The top of a data sheet looks like:
//!
//! ```text
//! Life expectancy at birth (total)
//! Years
//! Code   Continent, Region, Country   1950   1951   1952 ...
//! ```
//!
//! The indicator name comes first, an optional unit row follows, and the header row proper
//! starts with a `Code` marker, then a continent/region/country label, then one integer year
//! per remaining column. [`HeaderResolver`] walks these rows one [`SheetEvent`] at a time;
//! each [`HeaderResolver::transition`] consumes the resolver and returns its successor.

use crate::error::{IngestError, IngestResult};
use crate::xlsx::column::{cell_column, encode_column, MAX_COLUMN_INDEX};
use crate::xlsx::SheetEvent;

const HEADER_CODE: &str = "code";
const HEADER_CONTINENT_REGION_COUNTRY: &str = "continent";

/// Columns before the first year: code and continent/region/country.
pub const LEADING_COLUMNS: usize = 2;

/// Everything the header rows establish about a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetHeader {
    pub indicator: String,
    pub unit: Option<String>,
    /// The `Code...` marker cell as written.
    pub code_label: String,
    /// The `Continent, Region, Country` cell as written.
    pub region_label: String,
    /// Column count declared by the header row's `spans` attribute.
    pub width: usize,
    /// Year headers for columns C onward, as written. Not checked for uniqueness or order.
    pub years: Vec<String>,
}

impl SheetHeader {
    pub fn year_count(&self) -> usize {
        self.years.len()
    }
}

/// Position in the header rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderState {
    AwaitIndicator,
    AwaitCodeOrUnit {
        indicator: String,
        unit: Option<String>,
    },
    AwaitContinentLabel {
        indicator: String,
        unit: Option<String>,
        code_label: String,
    },
    AwaitYearHeaders {
        indicator: String,
        unit: Option<String>,
        code_label: String,
        region_label: String,
        width: usize,
        years: Vec<Option<String>>,
    },
}

impl HeaderState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitIndicator => "AwaitIndicator",
            Self::AwaitCodeOrUnit { .. } => "AwaitCodeOrUnit",
            Self::AwaitContinentLabel { .. } => "AwaitContinentLabel",
            Self::AwaitYearHeaders { .. } => "AwaitYearHeaders",
        }
    }
}

/// Outcome of one header transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Pending(HeaderResolver),
    Complete(SheetHeader),
}

/// State machine over the header rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderResolver {
    state: HeaderState,
    row: Option<u32>,
    spans: Option<String>,
    column: Option<usize>,
}

impl Default for HeaderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderResolver {
    pub fn new() -> Self {
        Self {
            state: HeaderState::AwaitIndicator,
            row: None,
            spans: None,
            column: None,
        }
    }

    pub fn state(&self) -> &HeaderState {
        &self.state
    }

    /// Apply one event.
    pub fn transition(mut self, event: &SheetEvent) -> IngestResult<Transition> {
        match event {
            SheetEvent::RowStart { number, spans } => {
                self.row = *number;
                self.spans = spans.clone();
                self.column = None;
            }
            SheetEvent::CellStart { reference, .. } => {
                self.column = Some(cell_column(reference.as_deref(), self.column)?);
            }
            SheetEvent::Value { text } => {
                self.state = self.accept_value(text)?;
            }
            SheetEvent::RowEnd => return self.end_row(),
            SheetEvent::SheetEnd => return Err(self.incomplete()),
        }
        Ok(Transition::Pending(self))
    }

    /// The error for a sheet that ends in the current state.
    fn incomplete(&self) -> IngestError {
        IngestError::IncompleteHeader {
            message: match self.state {
                HeaderState::AwaitIndicator => "sheet has no indicator name".to_string(),
                HeaderState::AwaitCodeOrUnit { .. } => {
                    format!("sheet ended before a '{HEADER_CODE}' header row was found")
                }
                _ => "sheet ended inside the header row".to_string(),
            },
        }
    }

    fn accept_value(&mut self, text: &str) -> IngestResult<HeaderState> {
        let state = std::mem::replace(&mut self.state, HeaderState::AwaitIndicator);
        let from = state.name();
        let next = match state {
            HeaderState::AwaitIndicator if text.trim().is_empty() => HeaderState::AwaitIndicator,
            HeaderState::AwaitIndicator => HeaderState::AwaitCodeOrUnit {
                indicator: text.to_string(),
                unit: None,
            },
            HeaderState::AwaitCodeOrUnit { indicator, unit } if text.trim().is_empty() => {
                HeaderState::AwaitCodeOrUnit { indicator, unit }
            }
            HeaderState::AwaitCodeOrUnit { indicator, unit } => {
                if text.to_lowercase().starts_with(HEADER_CODE) {
                    HeaderState::AwaitContinentLabel {
                        indicator,
                        unit,
                        code_label: text.to_string(),
                    }
                } else {
                    HeaderState::AwaitCodeOrUnit {
                        indicator,
                        unit: Some(text.to_string()),
                    }
                }
            }
            HeaderState::AwaitContinentLabel {
                indicator,
                unit,
                code_label,
            } => {
                if !text.to_lowercase().starts_with(HEADER_CONTINENT_REGION_COUNTRY) {
                    return Err(IngestError::SchemaMismatch {
                        message: format!(
                            "expected a cell starting with '{HEADER_CONTINENT_REGION_COUNTRY}' after '{code_label}', got '{text}'"
                        ),
                    });
                }
                let width = span_width(self.spans.as_deref(), self.row)?;
                HeaderState::AwaitYearHeaders {
                    indicator,
                    unit,
                    code_label,
                    region_label: text.to_string(),
                    width,
                    years: vec![None; width.saturating_sub(LEADING_COLUMNS)],
                }
            }
            HeaderState::AwaitYearHeaders {
                indicator,
                unit,
                code_label,
                region_label,
                width,
                mut years,
            } => {
                let column = self.column.unwrap_or_default();
                let slot = column
                    .checked_sub(LEADING_COLUMNS)
                    .and_then(|i| years.get_mut(i))
                    .ok_or_else(|| IngestError::SchemaMismatch {
                        message: format!(
                            "unexpected header cell '{text}' in column {} (year columns are C..{})",
                            column_name(column),
                            column_name(width.saturating_sub(1)),
                        ),
                    })?;
                if text.trim().parse::<i32>().is_err() {
                    return Err(IngestError::SchemaMismatch {
                        message: format!(
                            "expected a year in header column {}, got '{text}'",
                            column_name(column)
                        ),
                    });
                }
                *slot = Some(text.trim().to_string());
                HeaderState::AwaitYearHeaders {
                    indicator,
                    unit,
                    code_label,
                    region_label,
                    width,
                    years,
                }
            }
        };
        if next.name() != from {
            tracing::debug!(row = ?self.row, state = next.name(), "header transition");
        }
        Ok(next)
    }

    fn end_row(self) -> IngestResult<Transition> {
        let Self {
            state, row, spans, ..
        } = self;
        match state {
            // Indicator and unit rows are metadata-only.
            metadata @ (HeaderState::AwaitIndicator | HeaderState::AwaitCodeOrUnit { .. }) => {
                Ok(Transition::Pending(Self {
                    state: metadata,
                    row,
                    spans,
                    column: None,
                }))
            }
            HeaderState::AwaitContinentLabel { code_label, .. } => Err(IngestError::IncompleteHeader {
                message: format!(
                    "header row {} ended after '{code_label}' without a '{HEADER_CONTINENT_REGION_COUNTRY}' label",
                    row_name(row)
                ),
            }),
            HeaderState::AwaitYearHeaders {
                indicator,
                unit,
                code_label,
                region_label,
                width,
                years,
            } => {
                let years = years
                    .into_iter()
                    .enumerate()
                    .map(|(i, year)| {
                        year.ok_or_else(|| IngestError::SchemaMismatch {
                            message: format!(
                                "missing year header in column {} of header row {}",
                                column_name(i + LEADING_COLUMNS),
                                row_name(row)
                            ),
                        })
                    })
                    .collect::<IngestResult<Vec<_>>>()?;
                tracing::debug!(
                    indicator = %indicator,
                    width,
                    years = years.len(),
                    "header complete"
                );
                Ok(Transition::Complete(SheetHeader {
                    indicator,
                    unit,
                    code_label,
                    region_label,
                    width,
                    years,
                }))
            }
        }
    }
}

/// Drive a [`HeaderResolver`] over `events` until the header is complete.
///
/// Leaves `events` positioned at the first event after the header row.
pub fn resolve_header<I>(events: &mut I) -> IngestResult<SheetHeader>
where
    I: Iterator<Item = IngestResult<SheetEvent>>,
{
    let mut resolver = HeaderResolver::new();
    for event in events.by_ref() {
        match resolver.transition(&event?)? {
            Transition::Pending(next) => resolver = next,
            Transition::Complete(header) => return Ok(header),
        }
    }
    Err(resolver.incomplete())
}

/// Column count from a `spans` attribute such as `"1:12"` (the end of the last range).
///
/// Widths past column `ZZ` are rejected: no cell there can be addressed.
fn span_width(spans: Option<&str>, row: Option<u32>) -> IngestResult<usize> {
    let spans = spans.ok_or_else(|| IngestError::MalformedHeader {
        message: format!("header row {} has no spans attribute", row_name(row)),
    })?;
    spans
        .split_whitespace()
        .last()
        .and_then(|range| range.rsplit(':').next())
        .and_then(|end| end.trim().parse::<usize>().ok())
        .filter(|&width| (1..=MAX_COLUMN_INDEX + 1).contains(&width))
        .ok_or_else(|| IngestError::MalformedHeader {
            message: format!(
                "could not establish column count from spans '{spans}' of header row {}",
                row_name(row)
            ),
        })
}

fn column_name(index: usize) -> String {
    encode_column(index).unwrap_or_else(|_| format!("#{index}"))
}

fn row_name(row: Option<u32>) -> String {
    row.map_or_else(|| "?".to_string(), |r| r.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[SheetEvent]) -> IngestResult<SheetHeader> {
        let mut it = events.iter().cloned().map(Ok);
        resolve_header(&mut it)
    }

    fn header_row(spans: &str, cells: &[(&str, &str)]) -> Vec<SheetEvent> {
        let mut out = vec![SheetEvent::row_start(3, spans)];
        for (reference, text) in cells {
            out.push(SheetEvent::cell(reference));
            out.push(SheetEvent::value(*text));
        }
        out.push(SheetEvent::RowEnd);
        out
    }

    fn preamble() -> Vec<SheetEvent> {
        vec![
            SheetEvent::row_start(1, "1:4"),
            SheetEvent::cell("A1"),
            SheetEvent::value("GDP per capita"),
            SheetEvent::RowEnd,
            SheetEvent::row_start(2, "1:4"),
            SheetEvent::cell("A2"),
            SheetEvent::value("1990 GK$"),
            SheetEvent::RowEnd,
        ]
    }

    #[test]
    fn resolves_indicator_unit_and_years() {
        let mut events = preamble();
        events.extend(header_row(
            "1:4",
            &[
                ("A3", "Code"),
                ("B3", "Continent, Region, Country"),
                ("C3", "1990"),
                ("D3", "1991"),
            ],
        ));

        let header = run(&events).unwrap();
        assert_eq!(header.indicator, "GDP per capita");
        assert_eq!(header.unit.as_deref(), Some("1990 GK$"));
        assert_eq!(header.code_label, "Code");
        assert_eq!(header.width, 4);
        assert_eq!(header.years, vec!["1990".to_string(), "1991".to_string()]);
    }

    #[test]
    fn unit_row_is_optional() {
        let mut events = vec![
            SheetEvent::row_start(1, "1:3"),
            SheetEvent::cell("A1"),
            SheetEvent::value("Height"),
            SheetEvent::RowEnd,
        ];
        events.extend(header_row(
            "1:3",
            &[("A2", "CODE"), ("B2", "continent/region"), ("C2", "1800")],
        ));

        let header = run(&events).unwrap();
        assert_eq!(header.unit, None);
        assert_eq!(header.years, vec!["1800".to_string()]);
    }

    #[test]
    fn transition_is_stepwise() {
        let resolver = HeaderResolver::new();
        let Transition::Pending(resolver) = resolver.transition(&SheetEvent::value("Wages")).unwrap() else {
            panic!("expected pending");
        };
        assert_eq!(resolver.state().name(), "AwaitCodeOrUnit");
        let Transition::Pending(resolver) = resolver.transition(&SheetEvent::value("code")).unwrap() else {
            panic!("expected pending");
        };
        assert_eq!(resolver.state().name(), "AwaitContinentLabel");
    }

    #[test]
    fn rejects_non_numeric_year() {
        let mut events = preamble();
        events.extend(header_row(
            "1:4",
            &[("A3", "Code"), ("B3", "Continent"), ("C3", "1990"), ("D3", "abc")],
        ));
        let err = run(&events).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { .. }), "{err}");
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn rejects_wrong_continent_label() {
        let mut events = preamble();
        events.extend(header_row("1:3", &[("A3", "Code"), ("B3", "Country"), ("C3", "1990")]));
        let err = run(&events).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { .. }), "{err}");
    }

    #[test]
    fn missing_or_bad_spans_is_malformed_header() {
        let mut events = preamble();
        events.push(SheetEvent::RowStart {
            number: Some(3),
            spans: None,
        });
        events.extend([
            SheetEvent::cell("A3"),
            SheetEvent::value("Code"),
            SheetEvent::cell("B3"),
            SheetEvent::value("Continent"),
        ]);
        assert!(matches!(run(&events).unwrap_err(), IngestError::MalformedHeader { .. }));

        let mut events = preamble();
        events.extend(header_row("1:x", &[("A3", "Code"), ("B3", "Continent")]));
        assert!(matches!(run(&events).unwrap_err(), IngestError::MalformedHeader { .. }));
    }

    #[test]
    fn multi_range_spans_use_the_last_end() {
        assert_eq!(span_width(Some("1:2 4:9"), None).unwrap(), 9);
        assert_eq!(span_width(Some("7"), None).unwrap(), 7);
        assert!(span_width(Some("1:0"), None).is_err());
    }

    #[test]
    fn spans_past_zz_are_malformed() {
        assert_eq!(span_width(Some("1:702"), None).unwrap(), 702);
        for spans in ["1:703", "1:4000000000", "1:18446744073709551615"] {
            let err = span_width(Some(spans), Some(3)).unwrap_err();
            assert!(matches!(err, IngestError::MalformedHeader { .. }), "{err}");
            assert!(err.to_string().contains(spans), "{err}");
        }
    }

    #[test]
    fn code_without_continent_in_same_row_is_incomplete() {
        let mut events = preamble();
        events.extend(header_row("1:3", &[("A3", "Code")]));
        assert!(matches!(run(&events).unwrap_err(), IngestError::IncompleteHeader { .. }));
    }

    #[test]
    fn sheet_without_code_row_is_incomplete() {
        let err = run(&preamble()).unwrap_err();
        assert!(matches!(err, IngestError::IncompleteHeader { .. }), "{err}");

        let mut events = preamble();
        events.push(SheetEvent::SheetEnd);
        assert!(matches!(run(&events).unwrap_err(), IngestError::IncompleteHeader { .. }));
    }

    #[test]
    fn missing_year_cell_is_schema_mismatch() {
        let mut events = preamble();
        events.extend(header_row(
            "1:5",
            &[("A3", "Code"), ("B3", "Continent"), ("C3", "1990"), ("E3", "1992")],
        ));
        let err = run(&events).unwrap_err();
        assert!(err.to_string().contains("column D"), "{err}");
    }

    #[test]
    fn year_cell_outside_span_is_schema_mismatch() {
        let mut events = preamble();
        events.extend(header_row(
            "1:3",
            &[("A3", "Code"), ("B3", "Continent"), ("C3", "1990"), ("D3", "1991")],
        ));
        assert!(matches!(run(&events).unwrap_err(), IngestError::SchemaMismatch { .. }));
    }

    #[test]
    fn duplicate_and_unordered_years_are_accepted() {
        let mut events = preamble();
        events.extend(header_row(
            "1:5",
            &[
                ("A3", "Code"),
                ("B3", "Continent"),
                ("C3", "1991"),
                ("D3", "1990"),
                ("E3", "1990"),
            ],
        ));
        assert_eq!(run(&events).unwrap().years, vec!["1991", "1990", "1990"]);
    }
}
