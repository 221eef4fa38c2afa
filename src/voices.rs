use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    // "<language-code>-<Name>_<gender>", e.g. "en-Emma_woman"
    static ref VOICE_ID: Regex = Regex::new(r"^([A-Za-z]{2,3})-([^_]+)_([A-Za-z]+)$").unwrap();
}

/// A text-to-speech voice from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Woman,
    Man,
}

impl Voice {
    /// Ids that do not follow the catalog convention still produce a voice,
    /// filed under the "unknown" language.
    pub fn parse(id: &str) -> Self {
        match VOICE_ID.captures(id) {
            Some(caps) => Voice {
                id: id.to_string(),
                name: caps[2].to_string(),
                language: caps[1].to_lowercase(),
                gender: match caps[3].to_lowercase().as_str() {
                    "woman" | "female" => Some(Gender::Woman),
                    "man" | "male" => Some(Gender::Man),
                    _ => None,
                },
            },
            None => Voice {
                id: id.to_string(),
                name: id.replace('_', " "),
                language: "unknown".to_string(),
                gender: None,
            },
        }
    }
}

/// Group a flat catalog by language code. Voices keep their catalog order
/// within a language.
pub fn group_by_language<S: AsRef<str>>(ids: &[S]) -> BTreeMap<String, Vec<Voice>> {
    let mut grouped: BTreeMap<String, Vec<Voice>> = BTreeMap::new();
    for id in ids {
        let voice = Voice::parse(id.as_ref());
        grouped.entry(voice.language.clone()).or_default().push(voice);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_ids() {
        let v = Voice::parse("en-Emma_woman");
        assert_eq!(v.language, "en");
        assert_eq!(v.name, "Emma");
        assert_eq!(v.gender, Some(Gender::Woman));

        let v = Voice::parse("in-Samuel_man");
        assert_eq!(v.language, "in");
        assert_eq!(v.gender, Some(Gender::Man));
    }

    #[test]
    fn odd_ids_land_in_unknown() {
        let v = Voice::parse("narrator_default");
        assert_eq!(v.language, "unknown");
        assert_eq!(v.name, "narrator default");
        assert_eq!(v.gender, None);
    }

    #[test]
    fn groups_by_prefix() {
        let grouped = group_by_language(&[
            "en-Emma_woman",
            "de-Anna_woman",
            "en-James_man",
            "weird",
        ]);
        let langs: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(langs, vec!["de", "en", "unknown"]);
        let en: Vec<_> = grouped["en"].iter().map(|v| v.id.as_str()).collect();
        assert_eq!(en, vec!["en-Emma_woman", "en-James_man"]);
    }
}
