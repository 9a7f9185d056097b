use crate::llm::AnalysisInput;

pub fn system_prompt() -> String {
    [
        "You are a professional equity analyst focused on dividend-paying stocks.",
        "Return ONLY one valid JSON object. Do not wrap in markdown. Do not add prose.",
        "Output schema:",
        "{",
        "  \"financial_health\": \"assessment\",",
        "  \"investment_rating\": \"Buy|Hold|Sell\",",
        "  \"price_target\": 0.0,",
        "  \"risk_level\": \"Low|Medium|High\",",
        "  \"strengths\": [\"...\"],",
        "  \"weaknesses\": [\"...\"],",
        "  \"opportunities\": [\"...\"],",
        "  \"threats\": [\"...\"],",
        "  \"short_term_outlook\": \"3-6 months\",",
        "  \"long_term_outlook\": \"1-3 years\",",
        "  \"dividend_analysis\": \"or null\",",
        "  \"ai_recommendation\": \"final recommendation\"",
        "}",
        "Rules:",
        "- investment_rating MUST be present",
        "- price_target is a number in USD or null",
        "- SWOT fields are arrays of short strings",
    ]
    .join("\n")
}

fn or_na(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("N/A")
}

pub fn user_prompt(input: &AnalysisInput) -> String {
    let price = input
        .price
        .map(|p| format!("${p:.2}"))
        .unwrap_or_else(|| "N/A".to_string());
    let dividend_yield = input
        .dividend_yield
        .map(|y| format!("{y:.2}%"))
        .unwrap_or_else(|| "N/A".to_string());
    let payout_ratio = input
        .payout_ratio
        .map(|r| format!("{r:.1}%"))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "Analyze the following stock.\n\n\
Symbol: {}\n\
Company Name: {}\n\
Current Price: {price}\n\
Dividend Yield: {dividend_yield}\n\
Payout Ratio: {payout_ratio}\n\
Sector: {}\n\
Industry: {}\n",
        input.symbol,
        or_na(input.company_name.as_deref()),
        or_na(input.sector.as_deref()),
        or_na(input.industry.as_deref()),
    )
}
