//! Static geography reference data

/// Countries offered for shipping-address collection at checkout.
pub const CHECKOUT_COUNTRIES: &[&str] = &[
    "US", "CA", "GB", "AU", "DE", "FR", "IT", "ES", "NL", "BE", "AT", "SE", "DK", "NO", "FI",
    "PL", "IE", "PT", "CH", "NZ", "JP", "MX",
];

pub const US_STATES: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

pub const CA_PROVINCES: &[(&str, &str)] = &[
    ("Alberta", "AB"),
    ("British Columbia", "BC"),
    ("Manitoba", "MB"),
    ("New Brunswick", "NB"),
    ("Newfoundland and Labrador", "NL"),
    ("Northwest Territories", "NT"),
    ("Nova Scotia", "NS"),
    ("Nunavut", "NU"),
    ("Ontario", "ON"),
    ("Prince Edward Island", "PE"),
    ("Quebec", "QC"),
    ("Saskatchewan", "SK"),
    ("Yukon", "YT"),
];

pub fn is_checkout_country(code: &str) -> bool {
    CHECKOUT_COUNTRIES.iter().any(|c| c.eq_ignore_ascii_case(code.trim()))
}

/// Look up a two-letter state/province code from a full name. Only US and CA
/// have tables; other countries return `None`.
pub fn state_code(country_code: &str, name: &str) -> Option<&'static str> {
    let table = match country_code.trim().to_ascii_uppercase().as_str() {
        "US" => US_STATES,
        "CA" => CA_PROVINCES,
        _ => return None,
    };
    table
        .iter()
        .find(|(full, code)| full.eq_ignore_ascii_case(name.trim()) || code.eq_ignore_ascii_case(name.trim()))
        .map(|(_, code)| *code)
}
