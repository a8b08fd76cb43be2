//! 📅 Destination names with dates baked in. `logs-%{YYYY.MM.DD}` becomes `logs-2024.03.07`.
//!
//! 🧠 Knowledge graph:
//! - A token region is `%{...}`. Everything outside regions is copied through untouched.
//! - Region bodies go through a tiny tokenizer ([`tokenize`]) and a tiny parser
//!   ([`DatePattern::parse`]). No regex.
//! - A region that does not parse stays verbatim, braces and all.
//! - `/` is not allowed in index names, so it renders as `-`.
//!
//! Grammar, for the record:
//! ```text
//! region  := "%{" YYYY [ sep month [ sep day ] ] "}"
//! month   := "MM" | "M"
//! day     := "DD" | "D"
//! sep     := "-" | "." | "/"
//! ```

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::trace;

use crate::clock::Clock;

const REGION_OPEN: &str = "%{";
const REGION_CLOSE: char = '}';

/// 🔀 Separators allowed between date markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Dash,
    Dot,
    Slash,
}

impl Separator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(Separator::Dash),
            '.' => Some(Separator::Dot),
            '/' => Some(Separator::Slash),
            _ => None,
        }
    }

    // -- 🚫 index names can't contain '/', so slash renders as dash
    fn rendered(self) -> char {
        match self {
            Separator::Dash | Separator::Slash => '-',
            Separator::Dot => '.',
        }
    }
}

/// 0️⃣ `MM`/`DD` pad to two digits, `M`/`D` don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Padded,
    Unpadded,
}

impl Padding {
    fn render(self, value: u32) -> String {
        match self {
            Padding::Padded => format!("{value:02}"),
            Padding::Unpadded => value.to_string(),
        }
    }
}

/// 🧱 One lexical unit inside a region body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    Year,
    Month(Padding),
    Day(Padding),
    Sep(Separator),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unexpected character '{0}' in date template")]
    UnexpectedChar(char),
    #[error("'{marker}' repeated {len} times is not a date marker")]
    BadMarkerRun { marker: char, len: usize },
    #[error("date markers must read year, then month, then day, joined by separators")]
    BadShape,
}

/// 🔤 Split a region body into tokens. Marker runs are counted, not guessed.
pub fn tokenize(body: &str) -> Result<Vec<DateToken>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(sep) = Separator::from_char(c) {
            tokens.push(DateToken::Sep(sep));
            continue;
        }
        let mut len = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            len += 1;
        }
        let token = match (c, len) {
            ('Y', 4) => DateToken::Year,
            ('M', 2) => DateToken::Month(Padding::Padded),
            ('M', 1) => DateToken::Month(Padding::Unpadded),
            ('D', 2) => DateToken::Day(Padding::Padded),
            ('D', 1) => DateToken::Day(Padding::Unpadded),
            ('Y' | 'M' | 'D', len) => return Err(TemplateError::BadMarkerRun { marker: c, len }),
            (other, _) => return Err(TemplateError::UnexpectedChar(other)),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

/// 📏 How fine-grained the resulting name is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
    Day,
}

/// 📅 A parsed region body. Only the three legal shapes can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePattern {
    month: Option<(Separator, Padding)>,
    day: Option<(Separator, Padding)>,
}

impl DatePattern {
    pub fn parse(body: &str) -> Result<Self, TemplateError> {
        use DateToken::*;
        match tokenize(body)?.as_slice() {
            [Year] => Ok(Self {
                month: None,
                day: None,
            }),
            [Year, Sep(s1), Month(m)] => Ok(Self {
                month: Some((*s1, *m)),
                day: None,
            }),
            [Year, Sep(s1), Month(m), Sep(s2), Day(d)] => Ok(Self {
                month: Some((*s1, *m)),
                day: Some((*s2, *d)),
            }),
            _ => Err(TemplateError::BadShape),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match (self.month, self.day) {
            (_, Some(_)) => Granularity::Day,
            (Some(_), None) => Granularity::Month,
            (None, None) => Granularity::Year,
        }
    }

    pub fn render(&self, date: NaiveDate) -> String {
        let mut rendered = format!("{:04}", date.year());
        if let Some((sep, padding)) = self.month {
            rendered.push(sep.rendered());
            rendered.push_str(&padding.render(date.month()));
        }
        if let Some((sep, padding)) = self.day {
            rendered.push(sep.rendered());
            rendered.push_str(&padding.render(date.day()));
        }
        rendered
    }
}

/// 🔁 Expand every region in `template` against `date`. Idempotent: a name with no
/// regions comes back byte-for-byte.
pub fn resolve_template(template: &str, date: NaiveDate) -> String {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find(REGION_OPEN) {
        resolved.push_str(&rest[..open]);
        let body_start = open + REGION_OPEN.len();
        let Some(close) = rest[body_start..].find(REGION_CLOSE) else {
            // -- 🪤 unterminated region: keep the remainder as-is
            resolved.push_str(&rest[open..]);
            return resolved;
        };
        let body = &rest[body_start..body_start + close];
        if let Some(inner) = body.rfind(REGION_OPEN) {
            // -- 🪆 a nested opener: everything before it is plain text, rescan from there
            let inner_open = body_start + inner;
            resolved.push_str(&rest[open..inner_open]);
            rest = &rest[inner_open..];
            continue;
        }
        let region_end = body_start + close + REGION_CLOSE.len_utf8();
        match DatePattern::parse(body) {
            Ok(pattern) => resolved.push_str(&pattern.render(date)),
            Err(err) => {
                trace!("📅 leaving region '%{{{}}}' verbatim: {}", body, err);
                resolved.push_str(&rest[open..region_end]);
            }
        }
        rest = &rest[region_end..];
    }
    resolved.push_str(rest);
    resolved
}

/// 📅 Turns destination templates into concrete names using the clock's UTC date.
#[derive(Debug, Clone)]
pub struct DestinationNameResolver {
    clock: Arc<dyn Clock>,
}

impl DestinationNameResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn resolve(&self, template: &str) -> String {
        resolve_template(template, self.clock.now().date_naive())
    }
}
