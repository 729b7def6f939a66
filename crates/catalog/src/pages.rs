//! Page count with its `"<n> pages"` wire form.

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pages(pub i32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagesFormatError;

impl core::fmt::Display for PagesFormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("invalid pages format")
    }
}

impl std::error::Error for PagesFormatError {}

impl Pages {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl core::fmt::Display for Pages {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} pages", self.0)
    }
}

impl FromStr for Pages {
    type Err = PagesFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(' ');
        let (Some(count), Some("pages"), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PagesFormatError);
        };
        count.parse::<i32>().map(Pages).map_err(|_| PagesFormatError)
    }
}

impl Serialize for Pages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
