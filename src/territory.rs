//! Reference lists for metropolitan France scope values.

/// The 13 metropolitan regions, as the detail service names them.
pub const REGIONS: [&str; 13] = [
    "Île-de-France",
    "Auvergne-Rhône-Alpes",
    "Nouvelle-Aquitaine",
    "Bretagne",
    "Occitanie",
    "Grand Est",
    "Hauts-de-France",
    "Provence-Alpes-Côte d'Azur",
    "Normandie",
    "Pays de la Loire",
    "Centre-Val de Loire",
    "Bourgogne-Franche-Comté",
    "Corse",
];

/// Department codes `01` to `95`, zero-padded.
pub fn department_codes() -> Vec<String> {
    (1..=95).map(|n| format!("{:02}", n)).collect()
}

pub fn is_known_region(name: &str) -> bool {
    REGIONS.contains(&name.trim())
}

pub fn is_known_department(code: &str) -> bool {
    let code = code.trim();
    code.len() == 2
        && code
            .parse::<u8>()
            .map(|n| (1..=95).contains(&n))
            .unwrap_or(false)
}

/// Values of `values` not accepted by `known`.
pub fn unknown<'a>(values: &'a [String], known: fn(&str) -> bool) -> Vec<&'a str> {
    values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty() && !known(v))
        .collect()
}
