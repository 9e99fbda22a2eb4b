/// Outcome of extracting one field from a detail page
///
/// Extraction never fails a whole record: a label that is missing yields
/// `Absent`, a label whose value cannot be normalized yields `Malformed` with
/// the cleaned-up source text so nothing is silently thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted<T> {
    /// The value was found and is well-formed
    Present(T),

    /// The page has no value for this field
    Absent,

    /// Something was there but could not be normalized
    Malformed(String),
}

impl<T> Default for Extracted<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Extracted<T> {
    /// Returns true if the value is present and well-formed
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns true if the page had nothing for this field
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// The well-formed value, dropping malformed text
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::Malformed(_) => None,
        }
    }
}

impl Extracted<String> {
    /// The value to publish: normalized text if recognized, otherwise the verbatim source text
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Present(value) | Self::Malformed(value) => Some(value),
            Self::Absent => None,
        }
    }
}
