use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegexListError {
    #[error("invalid regex `{pattern}`: `{source}`")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// First-match capture groups of each pattern of a site's `RegexList`.
///
/// Entries line up with the patterns. An entry is empty when its pattern did
/// not match. Group 0 is the whole match, groups that did not participate
/// are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegexMatchSet {
    entries: Vec<Vec<String>>,
}

impl RegexMatchSet {
    pub fn build(body: &str, patterns: &[String]) -> Result<Self, RegexListError> {
        let mut entries = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let regex = Regex::new(pattern).map_err(|source| RegexListError::InvalidRegex {
                pattern: pattern.clone(),
                source,
            })?;
            let groups = match regex.captures(body) {
                Some(captures) => captures
                    .iter()
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect(),
                None => {
                    debug!("Regex `{}` did not match the response", pattern);
                    Vec::new()
                }
            };
            entries.push(groups);
        }
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<Vec<String>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups of the `index`-th pattern, 1-based.
    pub fn get(&self, index: usize) -> Option<&[String]> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(Vec::as_slice)
    }

    /// Resolve a regex expression body: `n` or `n,g`.
    ///
    /// `n` is a 1-based pattern index and `g` a 0-based group. Anything that
    /// does not address an existing group resolves to `None`.
    pub fn resolve(&self, body: &str) -> Option<&str> {
        let digits_end = body
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(body.len(), |(i, _)| i);
        if digits_end == 0 {
            return None;
        }

        let index: usize = body[..digits_end].parse().ok()?;
        let groups = self.get(index)?;

        let group = match body[digits_end..].strip_prefix(',') {
            Some(group) if !group.is_empty() => {
                let group: i64 = group.parse().ok()?;
                usize::try_from(group).ok()?
            }
            _ => 0,
        };
        groups.get(group).map(String::as_str)
    }
}
