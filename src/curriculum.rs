//! Subject and competency schema.
//!
//! Each subject carries its own fixed competency set; statistics and catalog
//! validation always go through these enums rather than raw tag strings.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    French,
    Math,
}

pub const ALL_SUBJECTS: [Subject; 2] = [Subject::French, Subject::Math];

const FRENCH_COMPETENCIES: [Competency; 3] = [
    Competency::Lire,
    Competency::Ecrire,
    Competency::Communiquer,
];
const MATH_COMPETENCIES: [Competency; 3] = [
    Competency::Resoudre,
    Competency::Raisonner,
    Competency::CommuniquerMath,
];

impl Subject {
    pub fn code(self) -> &'static str {
        match self {
            Subject::French => "french",
            Subject::Math => "math",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subject::French => "Français",
            Subject::Math => "Mathématiques",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "french" | "francais" | "fr" => Some(Subject::French),
            "math" | "maths" | "mathematiques" | "mathematics" => Some(Subject::Math),
            _ => None,
        }
    }

    /// Competencies in curriculum order.
    pub fn competencies(self) -> &'static [Competency] {
        match self {
            Subject::French => &FRENCH_COMPETENCIES,
            Subject::Math => &MATH_COMPETENCIES,
        }
    }

    /// Subjects selected by an optional filter, in curriculum order.
    pub fn selected(filter: Option<Subject>) -> Vec<Subject> {
        match filter {
            Some(s) => vec![s],
            None => ALL_SUBJECTS.to_vec(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Competency {
    Lire,
    Ecrire,
    Communiquer,
    Resoudre,
    Raisonner,
    CommuniquerMath,
}

impl Competency {
    pub fn subject(self) -> Subject {
        match self {
            Competency::Lire | Competency::Ecrire | Competency::Communiquer => Subject::French,
            Competency::Resoudre | Competency::Raisonner | Competency::CommuniquerMath => {
                Subject::Math
            }
        }
    }

    /// Stable tag stored in the database and sent over the wire.
    pub fn tag(self) -> &'static str {
        match self {
            Competency::Lire => "LIRE",
            Competency::Ecrire => "ECRIRE",
            Competency::Communiquer => "COMMUNIQUER",
            Competency::Resoudre => "C1",
            Competency::Raisonner => "C2",
            Competency::CommuniquerMath => "C3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Competency::Lire => "Lire des textes variés",
            Competency::Ecrire => "Écrire des textes variés",
            Competency::Communiquer => "Communiquer oralement",
            Competency::Resoudre => "Résoudre une situation-problème mathématique",
            Competency::Raisonner => "Utiliser un raisonnement mathématique",
            Competency::CommuniquerMath => "Communiquer à l'aide du langage mathématique",
        }
    }

    /// Parses a tag for `subject`. Accepts the canonical tag plus the label
    /// spellings used by imported lesson sheets ("Lecture", "Écriture", "Oral").
    pub fn parse_for(subject: Subject, raw: &str) -> Option<Self> {
        let folded = fold(raw);
        let found = match subject {
            Subject::French => match folded.as_str() {
                "lire" | "lecture" | "reading" => Competency::Lire,
                "ecrire" | "ecriture" | "writing" => Competency::Ecrire,
                "communiquer" | "oral" | "communication orale" | "communiquer oralement" => {
                    Competency::Communiquer
                }
                _ => return None,
            },
            Subject::Math => match folded.as_str() {
                "c1" | "resoudre" => Competency::Resoudre,
                "c2" | "raisonner" | "raisonnement" => Competency::Raisonner,
                "c3" | "communiquer" => Competency::CommuniquerMath,
                _ => return None,
            },
        };
        Some(found)
    }

    pub fn parse_tag(raw: &str) -> Option<Self> {
        ALL_SUBJECTS
            .iter()
            .flat_map(|s| s.competencies().iter().copied())
            .find(|c| c.tag() == raw)
    }
}

impl Serialize for Competency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl fmt::Display for Competency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Splits "Lecture, Oral" style lists. Order is kept, duplicates dropped.
/// Returns the first token that is not a competency of `subject` as the error.
pub fn parse_tag_list(subject: Subject, raw: &str) -> Result<Vec<Competency>, String> {
    let mut out = Vec::new();
    for token in raw.split([',', ';']) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let c = Competency::parse_for(subject, token).ok_or_else(|| token.to_string())?;
        if !out.contains(&c) {
            out.push(c);
        }
    }
    Ok(out)
}

/// Lowercases and strips the French diacritics found in curriculum data.
pub fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
