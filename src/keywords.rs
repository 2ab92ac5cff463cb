//! Operator keyword menu.
//!
//! The interactive prompt offers the first two presets, both of them, or
//! a custom comma-separated list. Reading stdin is the CLI's job; this
//! module only turns the answers into keywords.

use crate::models::KeywordPreset;

/// Menu entries as shown to the operator.
pub fn menu_lines(presets: &[KeywordPreset]) -> Vec<String> {
    let label = |idx: usize| {
        presets
            .get(idx)
            .map(|p| p.keywords.join(", "))
            .unwrap_or_else(|| "-".to_string())
    };
    vec![
        format!("1) {}", label(0)),
        format!("2) {}", label(1)),
        "3) both".to_string(),
        "4) custom (comma separated)".to_string(),
    ]
}

/// Whether `choice` asks for a custom list, so the caller knows to prompt.
pub fn wants_custom(choice: &str) -> bool {
    choice.trim() == "4"
}

/// Resolve a menu answer into keywords.
///
/// `1` and `2` pick a preset, `3` concatenates both and `4` splits
/// `custom` on commas. Anything else, or a custom list with nothing in
/// it, falls back to the first preset.
pub fn choose(choice: &str, custom: Option<&str>, presets: &[KeywordPreset]) -> Vec<String> {
    let preset = |idx: usize| presets.get(idx).map(|p| p.keywords.clone()).unwrap_or_default();

    let chosen = match choice.trim() {
        "1" => preset(0),
        "2" => preset(1),
        "3" => {
            let mut both = preset(0);
            both.extend(preset(1));
            both
        }
        "4" => {
            let list = split_custom(custom.unwrap_or_default());
            if list.is_empty() {
                log::warn!("No keywords entered, using the default preset");
            }
            list
        }
        other => {
            log::warn!("Invalid choice '{}', using the default preset", other);
            Vec::new()
        }
    };

    if chosen.is_empty() { preset(0) } else { chosen }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn split_custom(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    fn presets() -> Vec<KeywordPreset> {
        Config::default().presets
    }

    #[test]
    fn test_single_presets() {
        assert_eq!(choose("1", None, &presets()), vec!["วิศวกรรม ปัญญาประดิษฐ์"]);
        assert_eq!(choose(" 2 ", None, &presets()), vec!["วิศวกรรม คอมพิวเตอร์"]);
    }

    #[test]
    fn test_both_presets_in_order() {
        assert_eq!(
            choose("3", None, &presets()),
            vec!["วิศวกรรม ปัญญาประดิษฐ์", "วิศวกรรม คอมพิวเตอร์"]
        );
    }

    #[test]
    fn test_custom_list() {
        assert_eq!(
            choose("4", Some(" แพทย์ , ,วิทยาการข้อมูล,"), &presets()),
            vec!["แพทย์", "วิทยาการข้อมูล"]
        );
    }

    #[test]
    fn test_empty_custom_falls_back() {
        assert_eq!(choose("4", Some(" , "), &presets()), vec!["วิศวกรรม ปัญญาประดิษฐ์"]);
        assert_eq!(choose("4", None, &presets()), vec!["วิศวกรรม ปัญญาประดิษฐ์"]);
    }

    #[test]
    fn test_invalid_choice_falls_back() {
        assert_eq!(choose("9", None, &presets()), vec!["วิศวกรรม ปัญญาประดิษฐ์"]);
        assert_eq!(choose("", None, &presets()), vec!["วิศวกรรม ปัญญาประดิษฐ์"]);
    }

    #[test]
    fn test_menu_lines_show_presets() {
        let lines = menu_lines(&presets());
        assert_eq!(lines[0], "1) วิศวกรรม ปัญญาประดิษฐ์");
        assert_eq!(lines.len(), 4);
        assert!(wants_custom("4\n"));
        assert!(!wants_custom("3"));
    }
}
