use serde::{Deserialize, Serialize};

/// Prefix glyph marking a currency-formatted cell (Korean won).
pub const CURRENCY_GLYPH: char = '₩';

/// Spreadsheet renderings that stand for "no value".
pub const MISSING_SENTINELS: [&str; 7] = ["", "-", "N/A", "#N/A", "#DIV/0!", "#REF!", "#VALUE!"];

/// One raw cell as delivered by the table source.
///
/// Sources using unformatted rendering hand back plain numbers, everything
/// else arrives as text. `Empty` covers both JSON `null` and cells that were
/// never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawCell {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl RawCell {
    /// Trimmed textual form, matching how key and label columns are read.
    pub fn as_label(&self) -> String {
        match self {
            RawCell::Number(n) => n.to_string(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Empty => String::new(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::Text(value.to_string())
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        RawCell::Text(value)
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl<T: Into<RawCell>> From<Option<T>> for RawCell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawCell::Empty)
    }
}

/// A rectangular or ragged grid of raw cells. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTable(Vec<Vec<RawCell>>);

impl RawTable {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self(rows)
    }

    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.0
    }

    pub fn row(&self, index: usize) -> Option<&[RawCell]> {
        self.0.get(index).map(Vec::as_slice)
    }

    /// Cell lookup that treats anything past the physical bounds as empty.
    pub fn cell(&self, row: usize, column: usize) -> Option<&RawCell> {
        self.0.get(row).and_then(|r| r.get(column))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<C: Into<RawCell>> From<Vec<Vec<C>>> for RawTable {
    fn from(rows: Vec<Vec<C>>) -> Self {
        Self(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

/// Converts one raw cell into a number, or `None` when the cell holds no
/// usable value.
///
/// Checks run in a fixed order: sentinel, percentage suffix, currency
/// prefix, then grouped-digit decimal. The numeric part is read as its
/// longest leading decimal, so unit suffixes such as `명` or `원` are ignored.
pub fn normalize_cell(raw: Option<&RawCell>) -> Option<f64> {
    match raw? {
        RawCell::Number(n) => n.is_finite().then_some(*n),
        RawCell::Text(s) => normalize_text(s),
        RawCell::Empty => None,
    }
}

/// Text variant of [`normalize_cell`].
pub fn normalize_text(raw: &str) -> Option<f64> {
    let s = raw.trim();

    if MISSING_SENTINELS.contains(&s) {
        return None;
    }

    if let Some(number) = s.strip_suffix('%') {
        return parse_decimal(number.trim()).map(|v| v / 100.0);
    }

    if let Some(amount) = s.strip_prefix(CURRENCY_GLYPH) {
        let cleaned: String = amount
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        return parse_decimal(&cleaned);
    }

    parse_decimal(&s.replace(',', ""))
}

/// Header cells become plain trimmed labels, with no semantic parsing.
pub fn normalize_header(raw: Option<&RawCell>) -> String {
    raw.map(RawCell::as_label).unwrap_or_default()
}

fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = decimal_prefix_len(s.as_bytes());
    if end == 0 {
        return None;
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Length of the longest prefix shaped like `[+-]digits[.digits][e[+-]digits]`,
/// or 0 when no digit is found before the first non-numeric byte.
fn decimal_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_end = digits_from(i);
    let mut end = int_end;
    let mut has_digits = int_end > i;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }

    if !has_digits {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    end
}
