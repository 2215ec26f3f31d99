//! Turn model replies into decisions
//!
//! Replies are parsed leniently: the first JSON object in the text is taken,
//! and each listed action is decoded on its own so one malformed entry does
//! not cost the faction its whole turn.

use serde::Deserialize;

use crate::actions::FactionAction;
use crate::agents::Decision;
use crate::core::error::{GameError, Result};

#[derive(Deserialize)]
struct RawDecision {
    #[serde(default)]
    actions: Vec<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Slice out the outermost `{ ... }` of a reply that may carry prose or
/// code fences around it
pub fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| GameError::Llm("no JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| GameError::Llm("no closing brace found in response".into()))?;
    Ok(&response[start..=end])
}

pub fn parse_decision(response: &str) -> Result<Decision> {
    let json = extract_json(response)?;
    let raw: RawDecision = serde_json::from_str(json)
        .map_err(|e| GameError::Llm(format!("failed to parse decision: {}", e)))?;

    let mut actions = Vec::with_capacity(raw.actions.len());
    for value in raw.actions {
        match serde_json::from_value::<FactionAction>(value) {
            Ok(action) => actions.push(action),
            Err(e) => tracing::warn!(error = %e, "dropping malformed action"),
        }
    }
    Ok(Decision {
        actions,
        message: raw.message.filter(|m| !m.trim().is_empty()),
    })
}

/// Pull the rewritten personality out of an enrichment reply. Accepts either
/// `{"personality": "..."}` or bare text.
pub fn parse_personality(response: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct Personality {
        personality: String,
    }

    if let Ok(json) = extract_json(response) {
        if let Ok(parsed) = serde_json::from_str::<Personality>(json) {
            return non_empty(parsed.personality);
        }
    }
    non_empty(response.trim().to_string())
}

fn non_empty(text: String) -> Result<String> {
    if text.trim().is_empty() {
        Err(GameError::Llm("empty personality".into()))
    } else {
        Ok(text)
    }
}

pub const DECISION_SYSTEM_PROMPT: &str = r#"You command one faction in a turn-based strategy game on a 10x10 grid.
Coordinates are {"x": column, "y": row}, both 0-9. Tiles are adjacent only orthogonally.

Each turn you may issue any number of actions; they are applied in order and
each one is checked separately, so a failed action does not cancel the rest.

ACTIONS:
- recruit: buy troops on a tile you own. 1 material per troop. Max 50 troops per tile.
- move: send troops from a tile you own to an adjacent tile. Onto your own tile
  it is a relocation; onto any other tile it is an attack.
- convert: spend 3 faith to try to win over a tile adjacent to your territory.
  Chance grows with your faith. The old garrison flees to its owner's neighbouring tiles.
- construct: build on an empty tile you own. farm (5 material), temple (6 material,
  2 faith), barracks (6), tower (6), fortress (12).
- message: send a diplomatic note to another faction.

Watch the heavens. The gods intervene and remember.

OUTPUT FORMAT (JSON only, no explanation):
{
  "actions": [
    {"type": "recruit", "at": {"x": 0, "y": 0}, "count": 3, "reason": "..."},
    {"type": "move", "from": {"x": 0, "y": 0}, "to": {"x": 1, "y": 0}, "count": 2, "reason": "..."},
    {"type": "convert", "target": {"x": 2, "y": 0}, "reason": "..."},
    {"type": "construct", "at": {"x": 0, "y": 0}, "building": "farm", "reason": "..."},
    {"type": "message", "to": "FactionName", "text": "...", "reason": "..."}
  ],
  "message": "optional words spoken to the world"
}
"#;

pub const ENRICHMENT_SYSTEM_PROMPT: &str = r#"You maintain the personality of a faction in a strategy game.
The gods have just acted. Rewrite the faction's personality in two or three
sentences so it reflects how this event changed them. Keep their core identity.

OUTPUT FORMAT (JSON only, no explanation):
{"personality": "..."}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Coord;

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let response = "Here you go:\n```json\n{\"actions\": []}\n```\nGood luck.";
        assert_eq!(extract_json(response).unwrap(), "{\"actions\": []}");
    }

    #[test]
    fn test_extract_json_no_json() {
        assert!(extract_json("I refuse to play").is_err());
        assert!(extract_json("} backwards {").is_err());
    }

    #[test]
    fn test_parse_decision() {
        let reply = r#"{
            "actions": [
                {"type": "recruit", "at": {"x": 1, "y": 2}, "count": 3, "reason": "defend"},
                {"type": "construct", "at": {"x": 1, "y": 2}, "building": "farm"}
            ],
            "message": "We grow."
        }"#;
        let decision = parse_decision(reply).unwrap();
        assert_eq!(decision.actions.len(), 2);
        assert_eq!(
            decision.actions[0],
            FactionAction::Recruit {
                at: Coord::new(1, 2),
                count: 3,
                reason: "defend".into()
            }
        );
        assert_eq!(decision.message.as_deref(), Some("We grow."));
    }

    #[test]
    fn test_malformed_actions_are_dropped() {
        let reply = r#"{"actions": [
            {"type": "teleport", "to": {"x": 1, "y": 1}},
            {"type": "recruit", "at": {"x": 0, "y": 0}},
            {"type": "convert", "target": {"x": 4, "y": 4}}
        ]}"#;
        let decision = parse_decision(reply).unwrap();
        assert_eq!(decision.actions.len(), 1);
        assert!(matches!(decision.actions[0], FactionAction::Convert { .. }));
        assert_eq!(decision.message, None);
    }

    #[test]
    fn test_parse_personality() {
        assert_eq!(
            parse_personality(r#"{"personality": "Humbled."}"#).unwrap(),
            "Humbled."
        );
        assert_eq!(parse_personality("  Wary of the sky. ").unwrap(), "Wary of the sky.");
        assert!(parse_personality("   ").is_err());
    }
}
