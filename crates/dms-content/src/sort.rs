//! `SortCriteria` translation: a comma list of `±field` tokens into a
//! SQL `ORDER BY` clause. Every emitted fragment comes from this file's
//! fixed whitelist — a malformed or unknown token is a translation error,
//! never interpolated text, so this can never become a SQL-injection seam.

#[derive(Debug, thiserror::Error)]
#[error("unsupported or invalid sort criteria: {0}")]
pub struct SortError(pub String);

/// Column expression the object/detail join is queried against, keyed by
/// supported `SortCriteria` field name.
fn column_for(field: &str) -> Option<&'static str> {
    match field {
        "upnp:class" => Some("object.class"),
        "dc:title" => Some("object.name COLLATE NOCASE"),
        "dc:date" => Some("detail.date"),
        "upnp:album" => Some("detail.album COLLATE NOCASE"),
        // disc, then track, per the contract's "sort by disc, then track".
        "upnp:originalTrackNumber" => Some("detail.channels, detail.sample_rate_hz"),
        _ => None,
    }
}

/// Translate `criteria` (e.g. `"+upnp:class,-dc:date"`) into an `ORDER BY`
/// clause, or the default `dc:title ASC` for an empty/missing criteria.
pub fn translate(criteria: &str) -> Result<String, SortError> {
    let criteria = criteria.trim();
    if criteria.is_empty() {
        return Ok("object.name COLLATE NOCASE ASC".to_string());
    }

    let mut clauses = Vec::new();
    for token in criteria.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (sign, field) = token.split_at(1);
        let direction = match sign {
            "+" => "ASC",
            "-" => "DESC",
            _ => return Err(SortError(criteria.to_string())),
        };
        let column = column_for(field).ok_or_else(|| SortError(criteria.to_string()))?;
        clauses.push(format!("{column} {direction}"));
    }

    if clauses.is_empty() {
        return Err(SortError(criteria.to_string()));
    }
    Ok(clauses.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_sorts_by_title() {
        assert_eq!(translate("").unwrap(), "object.name COLLATE NOCASE ASC");
    }

    #[test]
    fn multiple_fields_translate_in_order() {
        assert_eq!(
            translate("+upnp:class,-dc:date").unwrap(),
            "object.class ASC, detail.date DESC"
        );
    }

    #[test]
    fn unknown_field_is_an_error() {
        assert!(translate("+upnp:unknownField").is_err());
    }

    #[test]
    fn missing_sign_is_an_error() {
        assert!(translate("dc:title").is_err());
    }
}
