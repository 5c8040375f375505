//! Selection primitives: logic modifiers, wildcard patterns and text tests.
//!
//! Column and row selection in [`Dataset`](crate::dataset::Dataset) keep one
//! flag per column or row. Each selection call computes a *match* per item
//! and folds it into the existing flag with a [`Logic`] value:
//!
//! ```
//! use sdds::selection::Logic;
//!
//! let logic = Logic::OR | Logic::ZERO_PREVIOUS;
//! assert!(logic.apply(true, true));
//! assert!(!logic.apply(true, false));
//! assert!(Logic::AND.apply(true, true));
//! assert!(!(Logic::AND | Logic::NEGATE_MATCH).apply(true, true));
//! ```

use crate::types::SddsType;
use glob::{MatchOptions, Pattern};
use regex::Regex;
use std::fmt;
use std::ops::BitOr;
use std::sync::LazyLock;

/// Bit set of logic modifiers for selection calls.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Logic(u32);

impl Logic {
    /// `new = match` with no other modifiers.
    pub const REPLACE: Logic = Logic(0);
    pub const AND: Logic = Logic(0x1);
    pub const OR: Logic = Logic(0x2);
    pub const NEGATE_MATCH: Logic = Logic(0x4);
    pub const NEGATE_PREVIOUS: Logic = Logic(0x8);
    pub const NEGATE_EXPRESSION: Logic = Logic(0x10);
    pub const ONE_PREVIOUS: Logic = Logic(0x20);
    pub const ZERO_PREVIOUS: Logic = Logic(0x40);
    pub const NOCASE_COMPARE: Logic = Logic(0x80);
    pub const INDIRECT_MATCH: Logic = Logic(0x100);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Logic(bits)
    }

    #[must_use]
    pub const fn contains(self, other: Logic) -> bool {
        self.0 & other.0 == other.0
    }

    /// Fold one match result into the previous flag.
    #[must_use]
    pub fn apply(self, previous: bool, matched: bool) -> bool {
        let mut previous = if self.contains(Logic::ZERO_PREVIOUS) {
            false
        } else if self.contains(Logic::ONE_PREVIOUS) {
            true
        } else {
            previous
        };
        if self.contains(Logic::NEGATE_PREVIOUS) {
            previous = !previous;
        }
        let mut result = if self.contains(Logic::NEGATE_MATCH) {
            !matched
        } else {
            matched
        };
        if self.contains(Logic::AND) {
            result = result && previous;
        } else if self.contains(Logic::OR) {
            result = result || previous;
        }
        if self.contains(Logic::NEGATE_EXPRESSION) {
            result = !result;
        }
        result
    }

    #[must_use]
    pub fn case_sensitive(self) -> bool {
        !self.contains(Logic::NOCASE_COMPARE)
    }
}

impl BitOr for Logic {
    type Output = Logic;

    fn bitor(self, rhs: Logic) -> Logic {
        Logic(self.0 | rhs.0)
    }
}

impl fmt::Debug for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Logic, &str); 9] = [
            (Logic::AND, "AND"),
            (Logic::OR, "OR"),
            (Logic::NEGATE_MATCH, "NEGATE_MATCH"),
            (Logic::NEGATE_PREVIOUS, "NEGATE_PREVIOUS"),
            (Logic::NEGATE_EXPRESSION, "NEGATE_EXPRESSION"),
            (Logic::ONE_PREVIOUS, "1_PREVIOUS"),
            (Logic::ZERO_PREVIOUS, "0_PREVIOUS"),
            (Logic::NOCASE_COMPARE, "NOCASE_COMPARE"),
            (Logic::INDIRECT_MATCH, "INDIRECT_MATCH"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("Logic(REPLACE)")
        } else {
            write!(f, "Logic({})", names.join("|"))
        }
    }
}

/// Shell-style pattern: `*`, `?`, `[...]`, `[^...]` and `{a,b}`.
#[derive(Clone, Debug)]
pub struct WildcardPattern {
    text: String,
    alternatives: Vec<Alternative>,
}

#[derive(Clone, Debug)]
enum Alternative {
    Glob(Pattern),
    Literal(String),
}

impl WildcardPattern {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let alternatives = expand_braces(text)
            .into_iter()
            .map(|alt| match Pattern::new(&translate(&alt)) {
                Ok(p) => Alternative::Glob(p),
                Err(_) => Alternative::Literal(alt),
            })
            .collect();
        Self {
            text: text.to_string(),
            alternatives,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn matches(&self, candidate: &str, case_sensitive: bool) -> bool {
        let options = MatchOptions {
            case_sensitive,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.alternatives.iter().any(|alt| match alt {
            Alternative::Glob(p) => p.matches_with(candidate, options),
            Alternative::Literal(l) if case_sensitive => l == candidate,
            Alternative::Literal(l) => l.eq_ignore_ascii_case(candidate),
        })
    }
}

/// True if `text` uses any wildcard syntax.
#[must_use]
pub fn has_wildcards(text: &str) -> bool {
    text.contains(['*', '?', '[', '{'])
}

/// Rewrite SDDS wildcard syntax into `glob` syntax.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('*' | '?' | '[' | ']' | '{' | '}')) => {
                    out.push('[');
                    out.push(escaped);
                    out.push(']');
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('!');
                }
            }
            // `glob` only accepts `**` as a whole path component.
            '*' => {
                out.push('*');
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Expand the first `{a,b,...}` group, recursively.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let mut depth = 0;
    let mut close = None;
    for (i, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };
    let (head, body, tail) = (&pattern[..open], &pattern[open + 1..close], &pattern[close + 1..]);
    let mut options = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                options.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    options.push(&body[start..]);
    options
        .into_iter()
        .flat_map(|option| expand_braces(&format!("{head}{option}{tail}")))
        .collect()
}

/// How columns are named in a selection call.
#[derive(Clone, Debug)]
pub enum ColumnSelector {
    /// Exact names.
    Names(Vec<String>),
    /// Names separated by commas or whitespace.
    NamesString(String),
    /// Wildcard pattern, optionally limited to a type class.
    Matching(String),
}

impl ColumnSelector {
    /// Individual names or patterns named by this selector.
    #[must_use]
    pub fn items(&self) -> Vec<String> {
        match self {
            ColumnSelector::Names(names) => names.clone(),
            ColumnSelector::NamesString(text) => text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            ColumnSelector::Matching(pattern) => vec![pattern.clone()],
        }
    }
}

/// Type filter for name matching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FindType {
    #[default]
    Any,
    Specified(SddsType),
    Numeric,
    Integer,
    Floating,
}

impl FindType {
    #[must_use]
    pub fn accepts(self, ty: SddsType) -> bool {
        match self {
            FindType::Any => true,
            FindType::Specified(t) => t == ty,
            FindType::Numeric => ty.is_numeric(),
            FindType::Integer => ty.is_integer(),
            FindType::Floating => ty.is_floating(),
        }
    }
}

/// Options for the numeric-text row test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NumScanMode {
    /// Select rows that are *not* numeric.
    pub invert: bool,
    /// Require the whole field to be a number rather than a leading number.
    pub strict: bool,
}

/// What `strtod` accepts: decimal and hex floats, `inf`, `infinity` and
/// `nan`. Fortran `d` exponents are not numbers here.
const NUMBER: &str = concat!(
    r"[+-]?(?:0[xX](?:[0-9a-fA-F]+\.?[0-9a-fA-F]*|\.[0-9a-fA-F]+)(?:[pP][+-]?\d+)?",
    r"|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?",
    r"|(?i:inf(?:inity)?|nan(?:\([0-9A-Za-z_]*\))?))",
);

static WHOLE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*(?:{NUMBER})\s*$")).expect("valid number pattern"));

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*(?:{NUMBER})")).expect("valid number pattern"));

impl NumScanMode {
    /// Whether `text` passes the test, including inversion.
    #[must_use]
    pub fn selects(self, text: &str) -> bool {
        let numeric = if self.strict {
            WHOLE_NUMBER.is_match(text)
        } else {
            LEADING_NUMBER.is_match(text)
        };
        numeric != self.invert
    }
}
