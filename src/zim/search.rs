//! Prefix search over the title-ordered pointer list.
//!
//! Titles are sorted by raw bytes, so a search is case sensitive by nature.
//! Archives capitalize titles inconsistently, so a prefix is expanded into
//! case variants (each word's first letter upper or lower) and every variant
//! is searched. Hits from all variants are merged and returned in the
//! archive's own title order.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::io::ReadAt;

use super::archive::Archive;
use super::structures::{DirEntry, Namespace};

/// Words beyond this count only get the uniform variants instead of every
/// upper/lower combination.
const MAX_COMBINATION_WORDS: usize = 6;

/// Case variants of `text` used for searching.
///
/// Words are split on whitespace and hyphens; a word's first letter is its
/// first alphabetic character, so leading punctuation is skipped. The text as
/// typed always comes first. With `full`, the all-uppercase text is added.
pub fn case_variants(text: &str, full: bool) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let letters = first_letter_positions(&chars);

    let mut variants = vec![text.to_string()];
    if letters.len() <= MAX_COMBINATION_WORDS {
        for mask in 0..(1u32 << letters.len()) {
            let upper: Vec<bool> = (0..letters.len()).map(|i| mask & (1 << i) != 0).collect();
            variants.push(apply_cases(&chars, &letters, &upper));
        }
    } else {
        let n = letters.len();
        for upper in [vec![true; n], vec![false; n]] {
            variants.push(apply_cases(&chars, &letters, &upper));
        }
        variants.push(apply_first_only(&chars, letters[0], true));
        variants.push(apply_first_only(&chars, letters[0], false));
    }
    if full {
        variants.push(text.to_uppercase());
    }

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

/// Index of the first alphabetic char of each word.
fn first_letter_positions(chars: &[char]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut want_letter = true;
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() || c == '-' {
            want_letter = true;
        } else if want_letter && c.is_alphabetic() {
            positions.push(i);
            want_letter = false;
        }
    }
    positions
}

fn apply_cases(chars: &[char], letters: &[usize], upper: &[bool]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut next = 0;
    for (i, &c) in chars.iter().enumerate() {
        if next < letters.len() && letters[next] == i {
            push_case(&mut out, c, upper[next]);
            next += 1;
        } else {
            out.push(c);
        }
    }
    out
}

fn apply_first_only(chars: &[char], position: usize, upper: bool) -> String {
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if i == position {
            push_case(&mut out, c, upper);
        } else {
            out.push(c);
        }
    }
    out
}

fn push_case(out: &mut String, c: char, upper: bool) {
    if upper {
        out.extend(c.to_uppercase());
    } else {
        out.extend(c.to_lowercase());
    }
}

impl<R: ReadAt + 'static> Archive<R> {
    /// Up to `max_results` entries of `namespace` whose title starts with
    /// `prefix` in any of its case variants, in title order.
    ///
    /// An empty prefix lists the first entries of the namespace. No match is
    /// an empty list, not an error.
    pub async fn find_dir_entries_with_prefix(
        &self,
        prefix: &str,
        namespace: Namespace,
        max_results: usize,
    ) -> Result<Vec<DirEntry>> {
        if max_results == 0 || self.entry_count() == 0 {
            return Ok(Vec::new());
        }

        // Keyed by title-order index so merged results keep archive order
        let mut hits: BTreeMap<u32, DirEntry> = BTreeMap::new();

        for variant in case_variants(prefix, false) {
            // Anything past the current max_results-th hit can't make the cut
            let cutoff = if hits.len() >= max_results {
                hits.keys().nth(max_results - 1).copied()
            } else {
                None
            };

            let mut index = self.title_lower_bound(namespace, &variant).await?;
            let mut taken = 0;
            while index < self.entry_count() && taken < max_results {
                if cutoff.is_some_and(|c| index > c) {
                    break;
                }
                let entry = self.dir_entry_by_title_index(index).await?;
                if entry.namespace != namespace || !entry.title_or_url().starts_with(&variant) {
                    break;
                }
                hits.entry(index).or_insert(entry);
                taken += 1;
                index += 1;
            }
        }

        tracing::trace!("Prefix {:?} in {}: {} hits", prefix, namespace, hits.len());
        Ok(hits.into_values().take(max_results).collect())
    }

    /// First title-order index whose `(namespace, title)` is not below
    /// `(namespace, prefix)`.
    async fn title_lower_bound(&self, namespace: Namespace, prefix: &str) -> Result<u32> {
        let mut lo = 0u32;
        let mut hi = self.entry_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.dir_entry_by_title_index(mid).await?;
            if (entry.namespace, entry.title_or_url()) < (namespace, prefix) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }
}
