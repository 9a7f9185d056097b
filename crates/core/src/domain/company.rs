use crate::domain::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// Low-churn descriptive data for a company, as stored in the logo and profile tables.
/// Any field may be missing; consumers fall back to placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyReference {
    pub symbol: Symbol,
    pub company_name: Option<String>,
    pub logo_url: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl CompanyReference {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            company_name: None,
            logo_url: None,
            sector: None,
            industry: None,
        }
    }
}
