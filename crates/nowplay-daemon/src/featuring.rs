//! Featured-artist credit extraction from track titles.

use std::ops::Range;

const MARKER: &str = "(feat. ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedCredit {
    /// Byte span of the full "(feat. …)" substring, parentheses included.
    pub span: Range<usize>,
    pub artists: Vec<String>,
}

/// Extract a "(feat. X & Y)" credit from a title.
///
/// The joiners " & " and " and " are normalised to ", " (in that order,
/// literal, case-sensitive) and the credit list split on ", ".  Empty
/// segments are kept: "(feat. )" yields a single empty artist.
pub fn featured_artists(title: &str) -> Option<FeaturedCredit> {
    let start = title.find(MARKER)?;
    let inner_start = start + MARKER.len();
    let inner_len = title[inner_start..].find(')')?;
    let raw = &title[inner_start..inner_start + inner_len];

    let normalised = raw.replace(" & ", ", ").replace(" and ", ", ");
    let artists = normalised.split(", ").map(str::to_string).collect();

    // Recompute the span by searching for the whole credit, so repeated
    // marker text elsewhere in the title cannot skew it.
    let needle = format!("{MARKER}{raw})");
    let span_start = title.find(&needle)?;
    Some(FeaturedCredit {
        span: span_start..span_start + needle.len(),
        artists,
    })
}
