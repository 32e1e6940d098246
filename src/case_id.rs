//! Case identifiers: `<date>__<seq>__<slug>`.
//!
//! The identifier doubles as the case directory name. Everything here is
//! pure: allocation is handed the sibling directory names by the caller.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Separator between the three identifier parts.
pub const ID_SEPARATOR: &str = "__";

/// Date format used in identifiers, metadata and the history log.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default zero-padding width of the sequence part.
pub const DEFAULT_SEQ_WIDTH: usize = 3;

/// Default maximum slug length in bytes.
pub const DEFAULT_SLUG_MAX_LEN: usize = 48;

/// Parsed case identifier.
///
/// The original directory name is kept verbatim so that identity checks
/// compare exactly what is on disk (sequence padding included).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseId {
    raw: String,
    date: NaiveDate,
    seq: u32,
    slug: String,
}

impl CaseId {
    /// Parse a directory name into an identifier.
    pub fn parse(name: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedIdentifier {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = name.split(ID_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(malformed("expected <date>__<seq>__<slug>"));
        }
        let (date_part, seq_part, slug) = (parts[0], parts[1], parts[2]);

        let date = parse_date(date_part).ok_or_else(|| malformed("date must be YYYY-MM-DD"))?;

        if seq_part.is_empty() || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("sequence must be a zero-padded integer"));
        }
        let seq = seq_part
            .parse::<u32>()
            .map_err(|_| malformed("sequence out of range"))?;

        if !is_valid_slug(slug) {
            return Err(malformed("slug must be non-empty [a-z0-9_]"));
        }

        Ok(Self {
            raw: name.to_string(),
            date,
            seq,
            slug: slug.to_string(),
        })
    }

    /// Build an identifier from its parts with the given sequence width.
    pub fn from_parts(date: NaiveDate, seq: u32, slug: &str, seq_width: usize) -> Result<Self> {
        let raw = format!(
            "{}{sep}{:0width$}{sep}{}",
            date.format(DATE_FORMAT),
            seq,
            slug,
            sep = ID_SEPARATOR,
            width = seq_width
        );
        Self::parse(&raw)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CaseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Ord for CaseId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.seq.cmp(&other.seq))
            .then_with(|| self.slug.cmp(&other.slug))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for CaseId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for CaseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Derive a slug from a title.
///
/// Lowercases, turns every run of characters outside `[a-z0-9]` into one
/// `_`, trims `_` at both ends and truncates to `max_len` bytes.
pub fn slugify(title: &str, max_len: usize) -> Result<String> {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;

    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else {
            pending_sep = true;
        }
    }

    // ASCII only, so any byte index is a char boundary.
    slug.truncate(max_len);
    let slug = slug.trim_end_matches('_').to_string();

    if slug.is_empty() {
        return Err(Error::InvalidTitle(title.to_string()));
    }
    Ok(slug)
}

/// Allocate a fresh identifier for a case created on `date`.
///
/// `siblings` are the existing directory names of the tasks root. The
/// smallest sequence number not used by a sibling of the same date wins.
pub fn allocate<'a, I>(
    date: NaiveDate,
    siblings: I,
    title: &str,
    seq_width: usize,
    slug_max_len: usize,
) -> Result<CaseId>
where
    I: IntoIterator<Item = &'a str>,
{
    let slug = slugify(title, slug_max_len)?;
    let used: HashSet<u32> = siblings
        .into_iter()
        .filter_map(|name| sequence_for_date(name, date))
        .collect();

    let seq = (0..=u32::MAX)
        .find(|candidate| !used.contains(candidate))
        .ok_or_else(|| Error::OperationFailed(format!("sequence space exhausted for {date}")))?;

    CaseId::from_parts(date, seq, &slug, seq_width)
}

/// Sequence claimed by a sibling name on `date`, even if its slug is broken.
fn sequence_for_date(name: &str, date: NaiveDate) -> Option<u32> {
    let mut parts = name.splitn(3, ID_SEPARATOR);
    let date_part = parts.next()?;
    let seq_part = parts.next()?;
    if parse_date(date_part)? != date {
        return None;
    }
    if seq_part.is_empty() || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seq_part.parse().ok()
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn slugify_collapses_punctuation_and_whitespace() {
        assert_eq!(slugify("Fix Login Bug!!", 48).unwrap(), "fix_login_bug");
        assert_eq!(slugify("  hello -- world  ", 48).unwrap(), "hello_world");
        assert_eq!(slugify("snake_case_title", 48).unwrap(), "snake_case_title");
        assert_eq!(slugify("Crème brûlée v2", 48).unwrap(), "cr_me_br_l_e_v2");
    }

    #[test]
    fn slugify_truncates_without_trailing_separator() {
        assert_eq!(slugify("abcd efgh", 5).unwrap(), "abcd");
        assert_eq!(slugify("abcdefgh", 5).unwrap(), "abcde");
    }

    #[test]
    fn slugify_rejects_titles_without_usable_characters() {
        let err = slugify("!!! ???", 48).unwrap_err();
        assert!(matches!(err, Error::InvalidTitle(_)));
        assert!(slugify("", 48).is_err());
    }

    #[test]
    fn parse_accepts_well_formed_names() {
        let id = CaseId::parse("2025-12-25__000__fix_login_bug").unwrap();
        assert_eq!(id.date(), date(2025, 12, 25));
        assert_eq!(id.seq(), 0);
        assert_eq!(id.slug(), "fix_login_bug");
        assert_eq!(id.to_string(), "2025-12-25__000__fix_login_bug");
    }

    #[test]
    fn parse_rejects_malformed_names() {
        for name in [
            "2025-12-25__000",
            "2025-13-01__000__x",
            "25-12-25__000__x",
            "2025-12-25__0a0__x",
            "2025-12-25____x",
            "2025-12-25__000__",
            "2025-12-25__000__Upper",
            "2025-12-25__000__a__b",
        ] {
            let err = CaseId::parse(name).unwrap_err();
            assert!(
                matches!(err, Error::MalformedIdentifier { .. }),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn allocate_picks_smallest_unused_sequence() {
        let day = date(2025, 12, 25);
        let siblings = [
            "2025-12-25__000__a",
            "2025-12-25__002__b",
            "2025-12-24__001__other_day",
        ];
        let id = allocate(day, siblings.iter().copied(), "Fix Login Bug!!", 3, 48).unwrap();
        assert_eq!(id.as_str(), "2025-12-25__001__fix_login_bug");
    }

    #[test]
    fn colliding_slugs_differ_only_in_sequence() {
        let day = date(2025, 12, 25);
        let first = allocate(day, std::iter::empty(), "Fix login bug", 3, 48).unwrap();
        let second = allocate(day, [first.as_str()], "fix LOGIN bug?", 3, 48).unwrap();

        assert_eq!(first.slug(), second.slug());
        assert_eq!(first.date(), second.date());
        assert_ne!(first.seq(), second.seq());
        assert!(CaseId::parse(second.as_str()).is_ok());
    }

    #[test]
    fn allocate_counts_siblings_with_broken_slugs() {
        let day = date(2025, 1, 2);
        let id = allocate(day, ["2025-01-02__000__BAD"], "x", 3, 48).unwrap();
        assert_eq!(id.seq(), 1);
    }

    #[test]
    fn ordering_is_by_date_then_sequence() {
        let mut ids = vec![
            CaseId::parse("2025-01-02__000__b").unwrap(),
            CaseId::parse("2025-01-01__010__z").unwrap(),
            CaseId::parse("2025-01-01__002__a").unwrap(),
        ];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(CaseId::as_str).collect();
        assert_eq!(
            names,
            vec!["2025-01-01__002__a", "2025-01-01__010__z", "2025-01-02__000__b"]
        );
    }
}
