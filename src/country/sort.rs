use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    NameAsc,
    NameDesc,
    GdpAsc,
    GdpDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::NameAsc,
        SortKey::NameDesc,
        SortKey::GdpAsc,
        SortKey::GdpDesc,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
            Self::GdpAsc => "gdp_asc",
            Self::GdpDesc => "gdp_desc",
        }
    }

    /// SQL `ORDER BY` body. Ties fall back to id so listings are stable.
    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            Self::NameAsc => "name_key ASC, id ASC",
            Self::NameDesc => "name_key DESC, id ASC",
            Self::GdpAsc => "estimated_gdp ASC, id ASC",
            Self::GdpDesc => "estimated_gdp DESC, id ASC",
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unsupported sort value '{0}', expected one of name_asc, name_desc, gdp_asc, gdp_desc")]
pub struct SortKeyParseError(pub String);

impl FromStr for SortKey {
    type Err = SortKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_slug() == normalized)
            .ok_or_else(|| SortKeyParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{SortKey, SortKeyParseError};

    #[test]
    fn parses_known_sort_values() {
        assert_eq!(SortKey::from_str("gdp_desc"), Ok(SortKey::GdpDesc));
        assert_eq!(SortKey::from_str(" Name_Asc "), Ok(SortKey::NameAsc));
    }

    #[test]
    fn rejects_unknown_sort_value() {
        assert_eq!(
            SortKey::from_str("bogus"),
            Err(SortKeyParseError("bogus".to_string()))
        );
    }
}
