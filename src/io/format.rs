//! Printf-style column formats for fixed-width export.

use crate::error::{BgcError, Result};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static FORMAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^%(-)?(\d*)(?:\.(\d+))?([sdfe])$").expect("valid format pattern")
});

/// One `%[-][width][.precision]kind` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFormat {
    left_align: bool,
    width: usize,
    precision: Option<usize>,
    kind: char,
}

impl FromStr for FieldFormat {
    type Err = BgcError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = FORMAT_RE
            .captures(s.trim())
            .ok_or_else(|| BgcError::configuration(format!("unsupported format '{}'", s)))?;
        let width = caps
            .get(2)
            .map(|m| m.as_str())
            .filter(|w| !w.is_empty())
            .map(str::parse)
            .transpose()
            .map_err(|_| BgcError::configuration(format!("invalid width in '{}'", s)))?
            .unwrap_or(0);
        let precision = caps
            .get(3)
            .map(|m| m.as_str().parse())
            .transpose()
            .map_err(|_| BgcError::configuration(format!("invalid precision in '{}'", s)))?;
        let kind = caps
            .get(4)
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or('s');
        Ok(Self {
            left_align: caps.get(1).is_some(),
            width,
            precision,
            kind,
        })
    }
}

impl FieldFormat {
    /// Pad text to the directive width
    pub fn pad(&self, text: &str) -> String {
        if self.left_align {
            format!("{:<width$}", text, width = self.width)
        } else {
            format!("{:>width$}", text, width = self.width)
        }
    }

    /// Render a number according to the directive kind
    pub fn format_float(&self, value: f64) -> String {
        if value.is_nan() {
            return self.pad("nan");
        }
        let text = match (self.kind, self.precision) {
            ('f', Some(p)) => format!("{:.*}", p, value),
            ('f', None) => format!("{:.6}", value),
            ('e', Some(p)) => format!("{:.*e}", p, value),
            ('e', None) => format!("{:.6e}", value),
            ('d', _) => format!("{}", value.round() as i64),
            _ => value.to_string(),
        };
        self.pad(&text)
    }

    pub fn format_int(&self, value: Option<i64>) -> String {
        match value {
            Some(v) => match self.kind {
                'f' | 'e' => self.format_float(v as f64),
                _ => self.pad(&v.to_string()),
            },
            None => self.pad("nan"),
        }
    }

    /// Render a string token; whitespace would split the column on reading
    pub fn format_str(&self, value: Option<&str>) -> String {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => self.pad(&v.split_whitespace().collect::<Vec<_>>().join("_")),
            None => self.pad("nan"),
        }
    }
}
