//! Selection ID Resolver (§4.C). Grounded on the original service's
//! `selection_id_generator.py`: a deterministic 16-hex SHA-256 digest over
//! the pipe-joined canonical fields, re-derived identically by every
//! process and every replay.

use crate::error::{EngineError, EngineResult};
use crate::hash::sha256_hex16;
use crate::model::{Side, NO_EDGE, INVALID};
use crate::sport::MarketType;

/// `"ML"` for moneyline, else a signed one-decimal string (`"-5.5"`,
/// `"+2.0"`) — the bit-exact `line_norm` format from §6.
pub fn normalize_line(market_type: MarketType, line: Option<f64>) -> String {
    match market_type {
        MarketType::Moneyline2Way | MarketType::Moneyline3Way => "ML".to_string(),
        _ => format!("{:+.1}", line.unwrap_or(0.0)),
    }
}

/// `selection_id(event, market_type, side_key, line?, book)` = first 16 hex
/// chars of SHA-256 over `event|market_type|side_key|line_normalized|book`.
pub fn selection_id(
    event_id: &str,
    market_type: MarketType,
    side_key: Side,
    line: Option<f64>,
    book_key: &str,
) -> String {
    let line_norm = normalize_line(market_type, line);
    let payload = format!("{event_id}|{market_type}|{side_key}|{line_norm}|{book_key}");
    sha256_hex16(payload.as_bytes())
}

/// Generates the full set of selections for a market (§4.C).
pub fn generate_market_selections(
    event_id: &str,
    market_type: MarketType,
    line: Option<f64>,
    book_key: &str,
    home_name: &str,
    away_name: &str,
) -> Vec<crate::model::Selection> {
    use crate::model::Selection;

    match market_type {
        MarketType::Spread => vec![
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Home, line, book_key),
                team_display_name: home_name.to_string(),
                side: Side::Home,
                market_line_for_selection: line,
                market_type,
            },
            Selection {
                selection_id: selection_id(
                    event_id,
                    market_type,
                    Side::Away,
                    line.map(|l| -l),
                    book_key,
                ),
                team_display_name: away_name.to_string(),
                side: Side::Away,
                market_line_for_selection: line.map(|l| -l),
                market_type,
            },
        ],
        MarketType::Moneyline2Way => vec![
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Home, None, book_key),
                team_display_name: home_name.to_string(),
                side: Side::Home,
                market_line_for_selection: None,
                market_type,
            },
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Away, None, book_key),
                team_display_name: away_name.to_string(),
                side: Side::Away,
                market_line_for_selection: None,
                market_type,
            },
        ],
        MarketType::Moneyline3Way => vec![
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Home, None, book_key),
                team_display_name: home_name.to_string(),
                side: Side::Home,
                market_line_for_selection: None,
                market_type,
            },
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Away, None, book_key),
                team_display_name: away_name.to_string(),
                side: Side::Away,
                market_line_for_selection: None,
                market_type,
            },
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Draw, None, book_key),
                team_display_name: "Draw".to_string(),
                side: Side::Draw,
                market_line_for_selection: None,
                market_type,
            },
        ],
        MarketType::Total => vec![
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Over, line, book_key),
                team_display_name: "Over".to_string(),
                side: Side::Over,
                market_line_for_selection: line,
                market_type,
            },
            Selection {
                selection_id: selection_id(event_id, market_type, Side::Under, line, book_key),
                team_display_name: "Under".to_string(),
                side: Side::Under,
                market_line_for_selection: line,
                market_type,
            },
        ],
    }
}

/// Enforces: every selection has a non-empty id; ids are unique across the
/// market; preference_id matches one selection (or the sentinels NO_EDGE /
/// INVALID); direction_id equals preference_id.
pub fn validate_selection_consistency(
    selections: &[crate::model::Selection],
    preference_id: &str,
    direction_id: &str,
) -> EngineResult<()> {
    if selections.iter().any(|s| s.selection_id.is_empty()) {
        return Err(EngineError::MalformedCompetitors(
            "selection with empty id".to_string(),
        ));
    }
    let mut ids: Vec<&str> = selections.iter().map(|s| s.selection_id.as_str()).collect();
    ids.sort_unstable();
    if ids.windows(2).any(|w| w[0] == w[1]) {
        return Err(EngineError::MalformedCompetitors(
            "duplicate selection id in market".to_string(),
        ));
    }
    if preference_id != NO_EDGE
        && preference_id != INVALID
        && !selections.iter().any(|s| s.selection_id == preference_id)
    {
        return Err(EngineError::MalformedCompetitors(format!(
            "preference_id {preference_id} matches no selection"
        )));
    }
    if direction_id != preference_id {
        return Err(EngineError::MalformedCompetitors(format!(
            "direction_id {direction_id} != preference_id {preference_id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_id_is_stable_and_sensitive_to_every_input() {
        let base = selection_id("G1", MarketType::Spread, Side::Home, Some(-5.5), "dk");
        assert_eq!(base, selection_id("G1", MarketType::Spread, Side::Home, Some(-5.5), "dk"));
        assert_ne!(base, selection_id("G2", MarketType::Spread, Side::Home, Some(-5.5), "dk"));
        assert_ne!(base, selection_id("G1", MarketType::Total, Side::Home, Some(-5.5), "dk"));
        assert_ne!(base, selection_id("G1", MarketType::Spread, Side::Away, Some(-5.5), "dk"));
        assert_ne!(base, selection_id("G1", MarketType::Spread, Side::Home, Some(-6.5), "dk"));
        assert_ne!(base, selection_id("G1", MarketType::Spread, Side::Home, Some(-5.5), "fd"));
        assert_eq!(base.len(), 16);
    }

    #[test]
    fn normalize_line_formats() {
        assert_eq!(normalize_line(MarketType::Moneyline2Way, None), "ML");
        assert_eq!(normalize_line(MarketType::Spread, Some(-5.5)), "-5.5");
        assert_eq!(normalize_line(MarketType::Total, Some(2.0)), "+2.0");
    }

    #[test]
    fn spread_market_selections_are_mirrored() {
        let sels = generate_market_selections("G1", MarketType::Spread, Some(-5.5), "dk", "Lakers", "Celtics");
        assert_eq!(sels.len(), 2);
        assert_eq!(sels[0].market_line_for_selection, Some(-5.5));
        assert_eq!(sels[1].market_line_for_selection, Some(5.5));
        validate_selection_consistency(&sels, &sels[0].selection_id, &sels[0].selection_id).unwrap();
    }

    #[test]
    fn mismatched_direction_is_rejected() {
        let sels = generate_market_selections("G1", MarketType::Total, Some(220.5), "dk", "H", "A");
        let err = validate_selection_consistency(&sels, &sels[0].selection_id, &sels[1].selection_id)
            .unwrap_err();
        assert_eq!(err.reason_code(), "MALFORMED_COMPETITORS");
    }
}
