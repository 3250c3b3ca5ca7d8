//! Prompt optimizer and flow-state injector.
//!
//! Agent prompts mix persona, a scripted conversation flow, and rules.
//! Naive truncation can cut the script out entirely, so this reorders the
//! prompt into fixed sections instead of truncating blindly, and prepends
//! a short flow-state instruction telling the model which turn this is.

const SCRIPT_MARKERS: &[&str] = &["FLUJO", "SCRIPT", "PASO 1", "CONVERSACIÓN", "GUIÓN"];
const RULE_MARKERS: &[&str] = &["IMPORTANTE", "RESTRICCIONES", "REGLAS", "NUNCA", "PROHIBIDO"];

const SCRIPT_MAX_BYTES: usize = 16 * 1024;
const PERSONA_MAX_BYTES: usize = 4 * 1024;
const RULES_MAX_BYTES: usize = 6 * 1024;
const NO_SCRIPT_MAX_BYTES: usize = 32 * 1024;

/// Above this many characters, use the higher-capability chat model.
const LARGE_MODEL_THRESHOLD_CHARS: usize = 10_000;

pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const MAX_TOKENS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Small,
    Large,
}

/// Picks the chat model by prompt size alone, per the documented
/// size-threshold policy (no other model-selection heuristic is in scope).
pub fn select_model(optimized_prompt: &str) -> ModelChoice {
    if optimized_prompt.chars().count() > LARGE_MODEL_THRESHOLD_CHARS {
        ModelChoice::Large
    } else {
        ModelChoice::Small
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Persona,
    Script,
    Rules,
}

/// Byte offsets (in `haystack`) where `marker` occurs, matched
/// case-insensitively character by character so offsets stay valid even
/// when a character's lowercase form has a different UTF-8 byte length.
fn find_marker_positions(haystack: &str, marker: &str) -> Vec<usize> {
    let marker_lower: Vec<char> = marker.chars().flat_map(char::to_lowercase).collect();
    let hay_chars: Vec<(usize, char)> = haystack.char_indices().collect();
    let mut hits = Vec::new();
    if marker_lower.is_empty() || marker_lower.len() > hay_chars.len() {
        return hits;
    }
    for start in 0..=(hay_chars.len() - marker_lower.len()) {
        let matches = marker_lower.iter().enumerate().all(|(k, mc)| {
            let mut lowered = hay_chars[start + k].1.to_lowercase();
            lowered.next() == Some(*mc) && lowered.next().is_none()
        });
        if matches {
            hits.push(hay_chars[start].0);
        }
    }
    hits
}

fn collect_markers(text: &str) -> Vec<(usize, Tag)> {
    let mut hits: Vec<(usize, Tag)> = SCRIPT_MARKERS
        .iter()
        .flat_map(|m| find_marker_positions(text, m))
        .map(|pos| (pos, Tag::Script))
        .chain(
            RULE_MARKERS
                .iter()
                .flat_map(|m| find_marker_positions(text, m))
                .map(|pos| (pos, Tag::Rules)),
        )
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    hits
}

fn truncate_chars(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Reorder a prompt into `[SCRIPT] [PERSONA] [RULES]` sections when a
/// script marker is present; otherwise just cap the total length.
pub fn optimize_prompt(raw: &str) -> String {
    let markers = collect_markers(raw);
    let has_script = markers.iter().any(|(_, tag)| *tag == Tag::Script);

    if !has_script {
        let capped = truncate_chars(raw, NO_SCRIPT_MAX_BYTES);
        return if capped.len() < raw.len() {
            format!("{capped}…")
        } else {
            capped
        };
    }

    let mut persona = String::new();
    let mut script = String::new();
    let mut rules = String::new();

    let mut cursor = 0usize;
    let mut current_tag = Tag::Persona;
    for (pos, tag) in &markers {
        let segment = &raw[cursor..*pos];
        match current_tag {
            Tag::Persona => persona.push_str(segment),
            Tag::Script => script.push_str(segment),
            Tag::Rules => rules.push_str(segment),
        }
        cursor = *pos;
        current_tag = *tag;
    }
    let tail = &raw[cursor..];
    match current_tag {
        Tag::Persona => persona.push_str(tail),
        Tag::Script => script.push_str(tail),
        Tag::Rules => rules.push_str(tail),
    }

    let script = truncate_chars(script.trim(), SCRIPT_MAX_BYTES);
    let persona = truncate_chars(persona.trim(), PERSONA_MAX_BYTES);
    let rules = truncate_chars(rules.trim(), RULES_MAX_BYTES);

    format!("[SCRIPT]\n{script}\n[PERSONA]\n{persona}\n[RULES]\n{rules}")
}

/// Flow-state instruction prepended to the system prompt. `prior_user_turns`
/// is how many user messages already exist in history before this one;
/// turn 0 (the caller's very first utterance) emits nothing because the
/// greeting already sets the scene.
pub fn flow_state_prefix(prior_user_turns: u32, customer_said: &str) -> Option<String> {
    match prior_user_turns {
        0 => None,
        1 => Some(format!(
            "This is turn 1. The customer said: \"{customer_said}\". Advance to the \
             next script step. Do not repeat the greeting."
        )),
        2 => Some(format!(
            "This is turn 2. The customer said: \"{customer_said}\". Continue \
             advancing the script from where you left off. Do not repeat the greeting."
        )),
        n => Some(format!(
            "This is turn {n}. The customer said: \"{customer_said}\". Keep advancing \
             the script naturally. Do not repeat the greeting."
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders_script_before_rules_even_when_rules_come_first_in_source() {
        let raw = "REGLAS: X\nFLUJO: Y";
        let optimized = optimize_prompt(raw);
        let script_pos = optimized.find("[SCRIPT]").unwrap();
        let rules_pos = optimized.find("[RULES]").unwrap();
        assert!(script_pos < rules_pos);
        assert!(optimized.contains('Y'));
        assert!(optimized.contains('X'));
    }

    #[test]
    fn case_insensitive_marker_match() {
        let raw = "importante: be polite\nscript: say hello";
        let optimized = optimize_prompt(raw);
        assert!(optimized.starts_with("[SCRIPT]"));
        assert!(optimized.contains("say hello"));
        assert!(optimized.contains("be polite"));
    }

    #[test]
    fn no_script_marker_truncates_past_32kb_with_ellipsis() {
        let raw = "a".repeat(40_000);
        let optimized = optimize_prompt(&raw);
        assert!(optimized.ends_with('…'));
        assert!(optimized.len() <= 32 * 1024 + '…'.len_utf8());
    }

    #[test]
    fn no_script_marker_under_32kb_is_untouched() {
        let raw = "just a persona description, no markers here";
        assert_eq!(optimize_prompt(raw), raw);
    }

    #[test]
    fn flow_state_turn_zero_is_none() {
        assert!(flow_state_prefix(0, "hello").is_none());
    }

    #[test]
    fn flow_state_distinct_templates_per_turn_bucket() {
        let t1 = flow_state_prefix(1, "hi").unwrap();
        let t2 = flow_state_prefix(2, "hi").unwrap();
        let t3 = flow_state_prefix(3, "hi").unwrap();
        let t4 = flow_state_prefix(4, "hi").unwrap();
        assert_ne!(t1, t2);
        assert_ne!(t2, t3);
        assert!(t3.contains("turn 3"));
        assert!(t4.contains("turn 4"));
    }

    #[test]
    fn model_selection_is_by_character_threshold() {
        assert_eq!(select_model(&"a".repeat(9_999)), ModelChoice::Small);
        assert_eq!(select_model(&"a".repeat(10_001)), ModelChoice::Large);
    }
}
