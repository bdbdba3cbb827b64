//! Parser for `.draw` bitmap fonts.
//!
//! The `.draw` format (used by the hoard-of-bitfonts collection) is plain text:
//!
//! ```text
//! # comment lines start with '#' in the first column
//! 41:	--##--
//! 	-#--#-
//! 	-####-
//! ```
//!
//! A line containing `:` starts a glyph; the part before the colon is the
//! character code in hex and anything after it is the glyph's first row.
//! Following lines are further rows of the same glyph. Rows are trimmed and
//! blank lines are skipped. In a row, `#` is a lit pixel and `-` an unlit one.
//!
//! [`Font`] borrows the source text and never copies it, so a font can live in
//! flash via `include_str!` without any heap.

/// Why a font source was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FontErrorKind {
    /// The text before `:` is not a hexadecimal character code
    InvalidCode,
    /// A glyph row appeared before any glyph header
    RowOutsideGlyph,
}

/// Error returned by [`Font::parse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FontError {
    /// One-based line number of the offending line
    pub line: usize,
    /// What was wrong with it
    pub kind: FontErrorKind,
}

impl core::fmt::Display for FontError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            FontErrorKind::InvalidCode => {
                write!(f, "Invalid character code on line {}", self.line)
            }
            FontErrorKind::RowOutsideGlyph => {
                write!(f, "Glyph row outside any glyph on line {}", self.line)
            }
        }
    }
}

impl core::error::Error for FontError {}

enum Record<'a> {
    Header {
        code: Result<u32, FontError>,
        row: Option<&'a str>,
    },
    Row(&'a str),
}

/// Walks the meaningful lines of a `.draw` source
struct Records<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Records<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            rest: source,
            line: 0,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (usize, Record<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (raw, rest) = self.rest.split_once('\n').unwrap_or((self.rest, ""));
            self.rest = rest;
            self.line += 1;

            if raw.starts_with('#') {
                continue;
            }
            if let Some((code, row)) = raw.split_once(':') {
                let line = self.line;
                let code = u32::from_str_radix(code.trim(), 16).map_err(|_| FontError {
                    line,
                    kind: FontErrorKind::InvalidCode,
                });
                let row = Some(row.trim()).filter(|r| !r.is_empty());
                return Some((line, Record::Header { code, row }));
            }
            let row = raw.trim();
            if !row.is_empty() {
                return Some((self.line, Record::Row(row)));
            }
        }
        None
    }
}

/// A bitmap font borrowed from `.draw` source text
#[derive(Debug, Clone, Copy)]
pub struct Font<'a> {
    source: &'a str,
}

impl<'a> Font<'a> {
    /// Validate `source` and wrap it as a font.
    ///
    /// # Errors
    ///
    /// Returns [`FontError`] for a malformed character code or for glyph rows
    /// that precede the first glyph header.
    pub fn parse(source: &'a str) -> Result<Self, FontError> {
        let mut in_glyph = false;
        let mut glyphs = 0usize;
        for (line, record) in Records::new(source) {
            match record {
                Record::Header { code, .. } => {
                    code?;
                    in_glyph = true;
                    glyphs += 1;
                }
                Record::Row(_) if !in_glyph => {
                    return Err(FontError {
                        line,
                        kind: FontErrorKind::RowOutsideGlyph,
                    });
                }
                Record::Row(_) => {}
            }
        }
        debug!("font parsed: {} glyphs", glyphs);
        Ok(Self { source })
    }

    /// Look up the glyph for a character code.
    ///
    /// If a code is defined more than once the first definition wins.
    #[must_use]
    pub fn glyph(&self, code: u32) -> Option<Glyph<'a>> {
        let mut records = Records::new(self.source);
        while let Some((_, record)) = records.next() {
            if let Record::Header { code: Ok(found), row } = record {
                if found == code {
                    return Some(Glyph {
                        code,
                        first: row,
                        rest: records.rest,
                    });
                }
            }
        }
        None
    }

    /// Iterate over every glyph in source order
    pub fn glyphs(&self) -> impl Iterator<Item = Glyph<'a>> + 'a {
        let mut records = Records::new(self.source);
        core::iter::from_fn(move || {
            while let Some((_, record)) = records.next() {
                if let Record::Header { code: Ok(code), row } = record {
                    return Some(Glyph {
                        code,
                        first: row,
                        rest: records.rest,
                    });
                }
            }
            None
        })
    }
}

/// One character's bitmap
#[derive(Debug, Clone, Copy)]
pub struct Glyph<'a> {
    code: u32,
    first: Option<&'a str>,
    rest: &'a str,
}

impl<'a> Glyph<'a> {
    /// Character code this glyph draws
    #[must_use]
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Rows from top to bottom
    pub fn rows(&self) -> Rows<'a> {
        Rows {
            first: self.first,
            records: Records::new(self.rest),
        }
    }

    /// Width in pixels (the longest row)
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows().map(|r| r.chars().count()).max().unwrap_or(0)
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows().count()
    }
}

/// Iterator over the rows of a [`Glyph`]
pub struct Rows<'a> {
    first: Option<&'a str>,
    records: Records<'a>,
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(first) = self.first.take() {
            return Some(first);
        }
        match self.records.next() {
            Some((_, Record::Row(row))) => Some(row),
            _ => {
                self.records.rest = "";
                None
            }
        }
    }
}
