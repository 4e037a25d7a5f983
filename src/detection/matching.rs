//! Text normalisation and fuzzy scoring between OCR output and scene names.

/// Partial matches are scaled down so they never tie a full containment.
const PARTIAL_MATCH_CEILING: f32 = 0.9;

/// Case-folds, turns punctuation into spaces and collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut mapped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            mapped.extend(c.to_lowercase());
        } else {
            mapped.push(' ');
        }
    }
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalises a scene identifier, splitting camel case and separators:
/// `"CareerLab_01"` becomes `"career lab 01"`.
pub fn normalize_scene_name(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len() + 8);
    let mut previous: Option<char> = None;
    for c in name.chars() {
        if let Some(prev) = previous {
            let lower_to_upper = prev.is_lowercase() && c.is_uppercase();
            let letter_to_digit = prev.is_alphabetic() && c.is_ascii_digit();
            let digit_to_letter = prev.is_ascii_digit() && c.is_alphabetic();
            if lower_to_upper || letter_to_digit || digit_to_letter {
                spaced.push(' ');
            }
        }
        spaced.push(c);
        previous = Some(c);
    }
    normalize_text(&spaced)
}

/// 1.0 for identical strings, falling towards 0.0 as edits accumulate.
pub fn similarity(a: &str, b: &str) -> f32 {
    strsim::normalized_levenshtein(a, b) as f32
}

/// Scores how well `name` (already normalised) appears in `text` (already
/// normalised). Full phrase containment scores 1.0; otherwise each name
/// token contributes its best fuzzy match against the text tokens.
pub fn containment_score(name: &str, text: &str, token_similarity: f32) -> f32 {
    if name.is_empty() || text.is_empty() {
        return 0.0;
    }

    let padded_text = format!(" {} ", text);
    if padded_text.contains(&format!(" {} ", name)) {
        return 1.0;
    }
    let text_tokens: Vec<&str> = text.split_whitespace().collect();
    let name_tokens: Vec<&str> = name.split_whitespace().collect();
    let compact_name: String = name_tokens.concat();
    if matches_token_run(&compact_name, &text_tokens) {
        return 1.0;
    }

    let total: f32 = name_tokens
        .iter()
        .map(|token| {
            text_tokens
                .iter()
                .map(|candidate| similarity(token, candidate))
                .filter(|score| *score >= token_similarity)
                .fold(0.0_f32, f32::max)
        })
        .sum();
    (total / name_tokens.len() as f32) * PARTIAL_MATCH_CEILING
}

// True when some run of consecutive tokens, glued together, spells `compact`.
// Catches OCR dropping or inserting spaces: "main menu" vs "mainmenu".
fn matches_token_run(compact: &str, tokens: &[&str]) -> bool {
    for start in 0..tokens.len() {
        let mut run = String::new();
        for token in &tokens[start..] {
            run.push_str(token);
            if run.len() >= compact.len() {
                break;
            }
        }
        if run == compact {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Main-Menu!!\n Start  "), "main menu start");
        assert_eq!(normalize_text("...\t"), "");
    }

    #[test]
    fn test_normalize_scene_name() {
        assert_eq!(normalize_scene_name("MainMenu"), "main menu");
        assert_eq!(normalize_scene_name("career_lab-01"), "career lab 01");
        assert_eq!(normalize_scene_name("Lab2B"), "lab 2 b");
        assert_eq!(normalize_scene_name("HUD"), "hud");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("same", "same"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        // Three edits over seven characters.
        assert!((similarity("kitten", "sitting") - 4.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_ascii_text_is_case_folded() {
        assert_eq!(normalize_text("ÉCOLE Über"), "école über");
        let name = normalize_scene_name("École");
        let text = normalize_text("ÉCOLE\nBack");
        assert_eq!(containment_score(&name, &text, 0.8), 1.0);
    }

    #[test]
    fn test_full_containment_scores_one() {
        assert_eq!(containment_score("main menu", "welcome main menu start", 0.8), 1.0);
        assert_eq!(containment_score("main menu", "xx mainmenu yy", 0.8), 1.0);
        assert_eq!(containment_score("mainmenu", "go to main menu", 0.8), 1.0);
    }

    #[test]
    fn test_word_boundaries_matter() {
        // "lab" alone must not fully match inside "label".
        let score = containment_score("lab", "label printer", 0.8);
        assert!(score < 1.0);
    }

    #[test]
    fn test_fuzzy_tokens_score_partially() {
        // OCR misread one letter in each word.
        let score = containment_score("career explorer", "carer explorr", 0.8);
        assert!(score > 0.6 && score < 0.9, "score was {}", score);
    }

    #[test]
    fn test_unrelated_text_scores_zero() {
        assert_eq!(containment_score("settings", "play the game", 0.8), 0.0);
        assert_eq!(containment_score("settings", "", 0.8), 0.0);
    }
}
