use divtrack_core::domain::company::CompanyReference;
use divtrack_core::domain::Symbol;
use divtrack_core::reference::{LogoEntry, ReferenceMap};

/// Logo rows in store shape, sorted by symbol.
pub fn to_company_rows(map: &ReferenceMap<LogoEntry>) -> Vec<CompanyReference> {
    let mut rows: Vec<CompanyReference> = map
        .iter()
        .filter_map(|(symbol, entry)| {
            let mut row = CompanyReference::new(Symbol::parse(symbol)?);
            row.logo_url = Some(entry.logo_url.clone());
            row.company_name = entry.company_name.clone();
            Some(row)
        })
        .collect();
    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    rows
}
