//! Word-level view of a single G-code line.

use std::sync::OnceLock;

use regex::Regex;

/// Strip a trailing `;` comment (and parenthesised comments) from a line
pub fn strip_comment(line: &str) -> &str {
    let end = line.find([';', '(']).unwrap_or(line.len());
    &line[..end]
}

/// Parsed command word plus its numeric parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GcodeWords {
    /// Command letter, uppercased (`G`, `M` or `T`)
    pub letter: char,
    /// Integer command number (`1` for `G1`, `104` for `M104`)
    pub code: u32,
    /// Parameters in line order, letters uppercased
    pub params: Vec<(char, f64)>,
}

impl GcodeWords {
    /// Parse the command portion of a line
    ///
    /// Returns `None` for blank lines, comments, macros and anything whose
    /// first word is not a G/M/T command. A leading `N` line number is skipped.
    pub fn parse(line: &str) -> Option<Self> {
        static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = WORD_REGEX.get_or_init(|| {
            Regex::new(r"([A-Za-z])\s*([-+]?(?:\d+\.?\d*|\.\d+))").expect("invalid regex pattern")
        });

        let code_part = strip_comment(line).trim();
        if code_part.is_empty() {
            return None;
        }

        let mut words = regex.captures_iter(code_part).filter_map(|caps| {
            let whole = caps.get(0)?;
            let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
            let raw = caps.get(2)?.as_str();
            Some((whole.start(), whole.end(), letter, raw))
        });

        // The command word opens the line, after an optional line number
        let (start, end, mut letter, mut raw) = words.next()?;
        if start != 0 {
            return None;
        }
        if letter == 'N' {
            let (next_start, _, next_letter, next_raw) = words.next()?;
            if !code_part[end..next_start].trim().is_empty() {
                return None;
            }
            (letter, raw) = (next_letter, next_raw);
        }
        if !matches!(letter, 'G' | 'M' | 'T') {
            return None;
        }
        let code = raw.split('.').next()?.parse::<u32>().ok()?;

        let params = words
            .filter_map(|(_, _, l, v)| v.parse::<f64>().ok().map(|v| (l, v)))
            .collect();

        Some(Self {
            letter,
            code,
            params,
        })
    }

    /// Value of a parameter, if present
    pub fn get(&self, letter: char) -> Option<f64> {
        self.params
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }

    pub fn has(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    /// True for G0 through G3
    pub fn is_motion(&self) -> bool {
        self.letter == 'G' && self.code <= 3
    }

    pub fn is(&self, letter: char, code: u32) -> bool {
        self.letter == letter && self.code == code
    }
}

/// True when a line is a bare firmware macro call such as `PAUSE` or
/// `EXCLUDE_OBJECT_START NAME=part`
pub fn is_macro_line(line: &str) -> bool {
    static MACRO_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = MACRO_REGEX
        .get_or_init(|| Regex::new(r"^[A-Z_]{3}[A-Z0-9_]*(\s|$)").expect("invalid regex pattern"));
    regex.is_match(strip_comment(line).trim())
}
