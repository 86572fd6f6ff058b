//! Closed vocabularies of the STRI dataset.
//!
//! Sector and policy-area codes are the only values the extractor may emit.
//! Two sentinels sit outside the real vocabularies: [`ALLSEC`] (a country's
//! overall score) and [`STRI`] (the aggregate restrictiveness measure).

/// Sector sentinel for a country's overall, non-disaggregated score.
pub const ALLSEC: &str = "ALLSEC";

/// Policy-area sentinel for the aggregate restrictiveness index.
pub const STRI: &str = "STRI";

/// The 22 service sectors as `(code, name)` pairs.
pub const SECTORS: [(&str, &str); 22] = [
    ("CS", "Computer services"),
    ("TC", "Telecommunication"),
    ("ASbrd", "Broadcasting"),
    ("ASmot", "Motion pictures"),
    ("ASsou", "Sound recording"),
    ("TRair", "Air transport"),
    ("TRmar", "Maritime transport"),
    ("TRrof", "Road freight transport"),
    ("TRrai", "Rail freight transport"),
    ("CR", "Courier services"),
    ("DS", "Distribution services"),
    ("LScar", "Logistics cargo-handling"),
    ("LSstg", "Logistics storage and warehouse"),
    ("LSfgt", "Logistics freight forwarding"),
    ("LScus", "Logistics customs brokerage"),
    ("PSleg", "Legal services"),
    ("PSacc", "Accounting services"),
    ("FSbnk", "Commercial banking"),
    ("FSins", "Insurance"),
    ("CO", "Construction"),
    ("PSarc", "Architecture services"),
    ("PSeng", "Engineering services"),
];

/// The five regulatory policy areas as `(code, name)` pairs.
pub const POLICY_AREAS: [(&str, &str); 5] = [
    ("ENTRY", "Restrictions on foreign entry"),
    ("MOVEPPL", "Restrictions to movement of people"),
    ("OTHDISC", "Other discriminatory measures"),
    ("COMPET", "Barriers to competition"),
    ("REGTRANS", "Regulatory transparency"),
];

const ALLSEC_NAME: &str = "All sectors (overall score)";
const STRI_NAME: &str = "Services Trade Restrictiveness Index";

/// Returns the full name of a sector code, including the `ALLSEC` sentinel.
#[must_use]
pub fn sector_name(code: &str) -> Option<&'static str> {
    if code == ALLSEC {
        return Some(ALLSEC_NAME);
    }
    SECTORS.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

/// Returns the full name of a policy-area code, including the `STRI` sentinel.
#[must_use]
pub fn policy_area_name(code: &str) -> Option<&'static str> {
    if code == STRI {
        return Some(STRI_NAME);
    }
    POLICY_AREAS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
}

/// Translates any sector or policy-area code to its name, leaving unknown
/// values unchanged.
#[must_use]
pub fn display_name(code: &str) -> &str {
    sector_name(code)
        .or_else(|| policy_area_name(code))
        .unwrap_or(code)
}

/// Resolves free text (a code or a full name, case-insensitive) to a sector
/// code. The `ALLSEC` sentinel resolves to itself.
#[must_use]
pub fn resolve_sector(text: &str) -> Option<&'static str> {
    let t = text.trim();
    if t.eq_ignore_ascii_case(ALLSEC) {
        return Some(ALLSEC);
    }
    SECTORS
        .iter()
        .find(|(c, n)| c.eq_ignore_ascii_case(t) || n.eq_ignore_ascii_case(t))
        .map(|(c, _)| *c)
}

/// Resolves free text (a code or a full name, case-insensitive) to a
/// policy-area code. The `STRI` sentinel resolves to itself.
#[must_use]
pub fn resolve_policy_area(text: &str) -> Option<&'static str> {
    let t = text.trim();
    if t.eq_ignore_ascii_case(STRI) {
        return Some(STRI);
    }
    POLICY_AREAS
        .iter()
        .find(|(c, n)| c.eq_ignore_ascii_case(t) || n.eq_ignore_ascii_case(t))
        .map(|(c, _)| *c)
}

/// Normalises an ISO3 country code. Returns `None` unless the input is
/// exactly three ASCII letters.
#[must_use]
pub fn normalize_country(text: &str) -> Option<String> {
    let t = text.trim();
    (t.len() == 3 && t.chars().all(|c| c.is_ascii_alphabetic())).then(|| t.to_ascii_uppercase())
}

/// Renders the sector vocabulary as `code: name` lines for prompt payloads.
#[must_use]
pub fn sector_listing() -> String {
    SECTORS
        .iter()
        .map(|(c, n)| format!("{c}: {n}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the policy-area vocabulary as `code: name` lines, with the
/// `STRI` sentinel last.
#[must_use]
pub fn policy_area_listing() -> String {
    POLICY_AREAS
        .iter()
        .map(|(c, n)| format!("{c}: {n}"))
        .chain(std::iter::once(format!("{STRI}: {STRI_NAME}")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sector_has_a_name() {
        assert_eq!(SECTORS.len(), 22);
        for (code, _) in SECTORS {
            let name = sector_name(code);
            assert!(name.is_some_and(|n| !n.is_empty()), "{code} has no name");
        }
    }

    #[test]
    fn test_sentinels_do_not_collide() {
        assert!(SECTORS.iter().all(|(c, _)| *c != ALLSEC && *c != STRI));
        assert!(POLICY_AREAS.iter().all(|(c, _)| *c != ALLSEC && *c != STRI));
        assert!(
            SECTORS
                .iter()
                .all(|(s, _)| POLICY_AREAS.iter().all(|(p, _)| p != s))
        );
    }

    #[test]
    fn test_resolve_sector() {
        assert_eq!(resolve_sector("TC"), Some("TC"));
        assert_eq!(resolve_sector("telecommunication"), Some("TC"));
        assert_eq!(resolve_sector("fsbnk"), Some("FSbnk"));
        assert_eq!(resolve_sector("allsec"), Some(ALLSEC));
        assert_eq!(resolve_sector("space tourism"), None);
    }

    #[test]
    fn test_resolve_policy_area() {
        assert_eq!(resolve_policy_area("stri"), Some(STRI));
        assert_eq!(
            resolve_policy_area("Barriers to competition"),
            Some("COMPET")
        );
        assert_eq!(resolve_policy_area("tariffs"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("PSleg"), "Legal services");
        assert_eq!(display_name("ENTRY"), "Restrictions on foreign entry");
        assert_eq!(display_name("STRI"), STRI_NAME);
        assert_eq!(display_name("FRA"), "FRA");
    }

    #[test]
    fn test_normalize_country() {
        assert_eq!(normalize_country(" fra "), Some("FRA".to_string()));
        assert_eq!(normalize_country("France"), None);
        assert_eq!(normalize_country("F1A"), None);
    }

    #[test]
    fn test_listings() {
        assert_eq!(sector_listing().lines().count(), 22);
        assert!(policy_area_listing().ends_with(&format!("STRI: {STRI_NAME}")));
    }
}
