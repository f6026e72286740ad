use serde::{Deserialize, Serialize};

/// Language of the user-facing chat replies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en")]
    En,
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PtBr => f.write_str("pt-BR"),
            Self::En => f.write_str("en"),
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pt-br" | "pt_br" | "pt" => Ok(Self::PtBr),
            "en" | "en-us" | "en_us" => Ok(Self::En),
            other => Err(format!("unknown locale: {other}")),
        }
    }
}
