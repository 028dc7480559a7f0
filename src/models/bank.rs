use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BankCode {
    #[serde(rename = "BOA")]
    Boa,
    #[serde(rename = "CBE")]
    Cbe,
    #[serde(rename = "Dashen")]
    Dashen,
}

impl BankCode {
    pub const ALL: [BankCode; 3] = [BankCode::Cbe, BankCode::Boa, BankCode::Dashen];

    pub fn as_str(&self) -> &'static str {
        match self {
            BankCode::Cbe => "CBE",
            BankCode::Boa => "BOA",
            BankCode::Dashen => "Dashen",
        }
    }

    pub fn bank_name(&self) -> &'static str {
        match self {
            BankCode::Cbe => "Commercial Bank of Ethiopia",
            BankCode::Boa => "Bank of Abyssinia",
            BankCode::Dashen => "Dashen Bank",
        }
    }

    pub fn default_app_id(&self) -> &'static str {
        match self {
            BankCode::Cbe => "com.combanketh.mobilebanking",
            BankCode::Boa => "com.boa.boaMobileBanking",
            BankCode::Dashen => "com.dashen.dashensuperapp",
        }
    }

    /// Environment variable that overrides the store identifier.
    pub fn app_id_var(&self) -> &'static str {
        match self {
            BankCode::Cbe => "CBE_APP_ID",
            BankCode::Boa => "BOA_APP_ID",
            BankCode::Dashen => "DASHEN_APP_ID",
        }
    }
}

impl std::fmt::Display for BankCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked banking application and its store listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankApp {
    pub code: BankCode,
    pub name: String,
    pub app_id: String,
}

impl BankApp {
    pub fn new(code: BankCode, app_id: impl Into<String>) -> Self {
        Self {
            code,
            name: code.bank_name().to_string(),
            app_id: app_id.into(),
        }
    }
}

/// Store listing summary for a tracked app, as written to `app_info.csv`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppInfo {
    pub app_id: String,
    pub bank_code: BankCode,
    pub bank_name: String,
    pub title: String,
    pub score: Option<f64>,
    pub ratings: u64,
    pub reviews: u64,
    pub installs: Option<String>,
}

/// Row of the `banks` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bank {
    pub bank_id: i64,
    pub bank_name: String,
    pub app_name: String,
}
