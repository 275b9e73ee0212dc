//! Version ordering.
//!
//! The migration engine needs an ordering only when a requested target
//! version has no rules of its own and the nearest lower registered version
//! must be substituted. Plain string order gets this wrong for multi-digit
//! segments (`"10.0" < "2.0"`), so the ordering is an explicit, swappable
//! strategy.

use crate::types::Version;
use std::cmp::Ordering;
use std::fmt;

/// A total order over [`Version`]s.
pub trait VersionComparator: Send + Sync + fmt::Debug {
    /// Compares two versions.
    fn compare(&self, a: &Version, b: &Version) -> Ordering;

    /// Returns whether `a` and `b` name the same version, even if
    /// [`compare`](Self::compare) orders them apart to stay total.
    fn equivalent(&self, a: &Version, b: &Version) -> bool {
        self.compare(a, b).is_eq()
    }
}

/// Plain string ordering.
///
/// Matches byte-wise comparison of the version strings. Only correct when
/// every segment has the same width.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lexicographic;

impl VersionComparator for Lexicographic {
    fn compare(&self, a: &Version, b: &Version) -> Ordering {
        a.as_str().cmp(b.as_str())
    }
}

/// Segment-wise ordering for dotted versions.
///
/// Versions are split on `.`, `-` and `_`. Numeric segments compare as
/// numbers, other segments as strings, and a numeric segment sorts before a
/// non-numeric one. Missing trailing segments count as `0`, so `"1"` and
/// `"1.0"` tie; ties are broken by string order to keep the order total.
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedNumeric;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Number(u64),
    Text(&'a str),
}

impl Segment<'_> {
    fn cmp_segment(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
        }
    }
}

fn segments(version: &str) -> Vec<Segment<'_>> {
    version
        .split(['.', '-', '_'])
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Segment::Number(n),
            Err(_) => Segment::Text(part),
        })
        .collect()
}

fn cmp_segments(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let zero = Segment::Number(0);

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).unwrap_or(&zero);
        let r = right.get(i).unwrap_or(&zero);
        match l.cmp_segment(r) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}

impl VersionComparator for DottedNumeric {
    fn compare(&self, a: &Version, b: &Version) -> Ordering {
        cmp_segments(a.as_str(), b.as_str()).then_with(|| a.as_str().cmp(b.as_str()))
    }

    fn equivalent(&self, a: &Version, b: &Version) -> bool {
        cmp_segments(a.as_str(), b.as_str()).is_eq()
    }
}
