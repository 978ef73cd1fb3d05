//! Episode selection from textual specifications such as `1,4,8-12`.
//!
//! The spec is a comma separated list of single episode numbers and
//! inclusive `a-b` ranges. An empty spec yields an empty [`EpisodeSet`],
//! which downstream filters treat as "every episode".
//!
//! # Example
//!
//! ```
//! use subsplease_core::episodes::EpisodeSet;
//!
//! let set = EpisodeSet::parse("1,4,8-12").unwrap();
//! assert_eq!(set.len(), 7);
//! assert!(set.admits(Some(9)));
//! assert_eq!(set.to_string(), "1,4,8-12");
//! ```

mod error;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub use error::{EpisodeError, MAX_RANGE_SPAN};

/// A set of episode numbers. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeSet {
    episodes: BTreeSet<u32>,
}

impl EpisodeSet {
    /// Parses an episode specification.
    ///
    /// # Errors
    ///
    /// Returns an [`EpisodeError`] when a token is not a number or range,
    /// when a range is reversed, or when a number does not fit in `u32`.
    pub fn parse(spec: &str) -> Result<Self, EpisodeError> {
        let mut episodes = BTreeSet::new();
        if spec.trim().is_empty() {
            return Ok(Self { episodes });
        }

        for raw_token in spec.split(',') {
            let token = raw_token.trim();
            if token.is_empty() {
                return Err(EpisodeError::malformed(raw_token, "empty entry"));
            }

            match token.split_once('-') {
                None => {
                    episodes.insert(parse_number(token, token)?);
                }
                Some((start, end)) => {
                    if end.contains('-') {
                        return Err(EpisodeError::malformed(token, "too many '-' in range"));
                    }
                    let start = parse_number(token, start.trim())?;
                    let end = parse_number(token, end.trim())?;
                    if start > end {
                        return Err(EpisodeError::ReversedRange {
                            token: token.to_string(),
                            start,
                            end,
                        });
                    }
                    if end - start >= MAX_RANGE_SPAN {
                        return Err(EpisodeError::RangeTooLarge {
                            token: token.to_string(),
                        });
                    }
                    episodes.extend(start..=end);
                }
            }
        }

        Ok(Self { episodes })
    }

    /// Returns true when no episode was requested (everything matches).
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Number of explicitly requested episodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// Returns true when the set holds no episode numbers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Returns true if the episode number is explicitly in the set.
    #[must_use]
    pub fn contains(&self, episode: u32) -> bool {
        self.episodes.contains(&episode)
    }

    /// Decides whether an offer's episode passes this selection.
    ///
    /// Offers without an episode number (batches, movies) only pass an
    /// unrestricted selection.
    #[must_use]
    pub fn admits(&self, episode: Option<u32>) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        episode.is_some_and(|number| self.contains(number))
    }

    /// Smallest requested episode.
    #[must_use]
    pub fn min(&self) -> Option<u32> {
        self.episodes.first().copied()
    }

    /// Largest requested episode.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        self.episodes.last().copied()
    }

    /// Iterates over the episodes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.episodes.iter().copied()
    }
}

fn parse_number(token: &str, value: &str) -> Result<u32, EpisodeError> {
    if value.is_empty() {
        return Err(EpisodeError::malformed(token, "missing number"));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EpisodeError::malformed(
            token,
            format!("'{value}' is not a non-negative integer"),
        ));
    }
    value
        .parse::<u32>()
        .map_err(|e| EpisodeError::malformed(token, e.to_string()))
}

impl FromStr for EpisodeSet {
    type Err = EpisodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical rendering: ascending, consecutive runs collapsed into ranges.
impl fmt::Display for EpisodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for episode in &self.episodes {
            match runs.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(*episode) => *end = *episode,
                _ => runs.push((*episode, *episode)),
            }
        }

        for (index, (start, end)) in runs.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

impl FromIterator<u32> for EpisodeSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            episodes: iter.into_iter().collect(),
        }
    }
}
