use serde_json::Value;

use crate::types::InputState;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParsedClientMessage {
    Input(InputState),
    NewGame { seed: Option<u32> },
    Ping { t: f64 },
}

/// Parses one client text frame. Absent flags default to released; a present
/// but malformed field rejects the whole message.
pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "input" => {
            let up = parse_flag(object.get("up"))?;
            let down = parse_flag(object.get("down"))?;
            let left = parse_flag(object.get("left"))?;
            let right = parse_flag(object.get("right"))?;
            Some(ParsedClientMessage::Input(InputState {
                up,
                down,
                left,
                right,
            }))
        }
        "new_game" => {
            let seed = parse_optional_seed(object.get("seed"))?;
            Some(ParsedClientMessage::NewGame { seed })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_flag(value: Option<&Value>) -> Option<bool> {
    match value {
        None => Some(false),
        Some(value) => value.as_bool(),
    }
}

fn parse_optional_seed(value: Option<&Value>) -> Option<Option<u32>> {
    let Some(value) = value else {
        return Some(None);
    };
    // Seeds wider than 32 bits fold down the same way the simulator
    // normalizes them.
    value.as_u64().map(|seed| Some(seed as u32))
}
