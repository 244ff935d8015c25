//! Positional decoding of pipe-delimited dump lines.
//!
//! Decoding is best-effort: a line with fewer values than the schema names
//! yields absent values for the missing trailing fields, extra values are
//! ignored, and empty strings are reported as absent.

/// Field delimiter used by every line of a crash dump.
pub const DELIMITER: char = '|';

/// Map an empty string to an absent value.
pub fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Named values decoded from one line, in schema order.
///
/// Holds one entry per schema name, repeated names included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedFields<'a> {
    values: Vec<(&'static str, Option<&'a str>)>,
}

impl<'a> ParsedFields<'a> {
    /// Value of the first field called `name`, or `None` when it is absent
    /// or not part of the schema.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.values
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| *value)
    }

    /// Value at schema position `index`.
    pub fn get_index(&self, index: usize) -> Option<&'a str> {
        self.values.get(index).and_then(|(_, value)| *value)
    }

    /// Number of schema fields; always equal to the schema length.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&'a str>)> + '_ {
        self.values.iter().copied()
    }
}

/// Split `line` on [`DELIMITER`] and zip the values onto `names`.
pub fn split_fields<'a>(line: &'a str, names: &[&'static str]) -> ParsedFields<'a> {
    let mut tokens = line.split(DELIMITER);
    let values = names
        .iter()
        .map(|name| (*name, tokens.next().and_then(non_empty)))
        .collect();
    ParsedFields { values }
}
