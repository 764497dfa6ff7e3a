use serde::{Deserialize, Serialize};

/// Number of outbound link columns appended to every fund
pub const NB_LINKS: usize = 3;

/// Column headers of the input table
pub const COL_NAME: &str = "Nom du fonds";
pub const COL_ISIN: &str = "Code ISIN";
pub const COL_TYPE: &str = "Type";
pub const COL_SUB_TYPE: &str = "Sous type";

/// Headers of the appended link columns
pub const LINK_COLUMNS: [&str; NB_LINKS] = ["Lien 1", "Lien 2", "Lien 3"];

pub const DEFAULT_OUTPUT_FILE: &str = "fonds_mailles.csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub group_by: GroupBy,
    pub ordering: LinkOrdering,
    pub soft_cap: usize,
    pub ensure_one_inbound: bool,
    // Fixed seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
    pub delimiter: char,
    pub output_file: Option<String>,
    #[serde(default)]
    pub extra_boilerplate_tokens: Vec<String>,
}

/// Key used to build the primary candidate group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupBy {
    #[serde(rename = "root-name")]
    RootName,
    #[serde(rename = "sub-type")]
    SubType,
}

/// Ordering of the type and random candidate pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOrdering {
    #[serde(rename = "least-used")]
    LeastUsed,
    #[serde(rename = "alphabetical")]
    Alphabetical,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_by: GroupBy::RootName,
            ordering: LinkOrdering::LeastUsed,
            soft_cap: 12,
            ensure_one_inbound: true,
            seed: None,
            delimiter: ',',
            output_file: Some(DEFAULT_OUTPUT_FILE.to_string()),
            extra_boilerplate_tokens: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    /// Delimiter as a single byte, as the csv crate expects
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(anyhow::anyhow!("Delimiter must be an ASCII character, got '{}'", self.delimiter))
        }
    }
}

impl GroupBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "root-name" => Some(GroupBy::RootName),
            "sub-type" => Some(GroupBy::SubType),
            _ => None,
        }
    }

    /// Columns that must be present in the input for this grouping
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![COL_NAME, COL_ISIN, COL_TYPE];
        if *self == GroupBy::SubType {
            columns.push(COL_SUB_TYPE);
        }
        columns
    }
}

impl LinkOrdering {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "least-used" => Some(LinkOrdering::LeastUsed),
            "alphabetical" => Some(LinkOrdering::Alphabetical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundRecord {
    pub name: String,
    pub isin: String,
    pub fund_type: String,
    pub sub_type: Option<String>,
    pub root_name: String,
}

impl FundRecord {
    /// Grouping key for the primary pool, `None` when the fund belongs to no group
    pub fn group_key(&self, group_by: GroupBy) -> Option<&str> {
        let key = match group_by {
            GroupBy::RootName => self.root_name.as_str(),
            GroupBy::SubType => self.sub_type.as_deref().unwrap_or(""),
        };
        non_blank(key)
    }

    pub fn type_key(&self) -> Option<&str> {
        non_blank(&self.fund_type)
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
