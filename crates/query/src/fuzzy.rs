use eulix_kb::KbIndex;

/// Symmetric similarity between a query pattern and a symbol name.
///
/// Exact match (1000) beats substring containment (500); otherwise positional
/// character matches (+10 each) and character-bag overlap (+2 each) build the
/// score, penalized by the length difference.
pub fn fuzzy_score(pattern: &str, target: &str) -> i64 {
    if pattern == target {
        return 1000;
    }
    if target.contains(pattern) {
        return 500;
    }

    let pattern_bytes = pattern.as_bytes();
    let target_bytes = target.as_bytes();

    let mut score: i64 = 0;
    for i in 0..pattern_bytes.len().min(target_bytes.len()) {
        if pattern_bytes[i] == target_bytes[i] {
            score += 10;
        }
    }

    let mut bag = std::collections::HashMap::new();
    for ch in pattern.chars() {
        *bag.entry(ch).or_insert(0i64) += 1;
    }
    for ch in target.chars() {
        if let Some(count) = bag.get_mut(&ch) {
            if *count > 0 {
                score += 2;
                *count -= 1;
            }
        }
    }

    score - (target.len() as i64 - pattern.len() as i64).abs()
}

/// Closest function and type names for a symbol nothing matched exactly.
/// Returns up to five `"name (kind)"` suggestions, best first.
pub fn fuzzy_suggestions(entity: &str, index: &KbIndex) -> Vec<String> {
    let entity_lower = entity.to_lowercase();
    let mut matches: Vec<(i64, String, &str)> = Vec::new();

    for name in index.functions_by_name.keys() {
        let score = fuzzy_score(&entity_lower, &name.to_lowercase());
        if score > 0 {
            matches.push((score, name.clone(), "function"));
        }
    }
    for name in index.types_by_name.keys() {
        let score = fuzzy_score(&entity_lower, &name.to_lowercase());
        if score > 0 {
            matches.push((score, name.clone(), "type"));
        }
    }

    matches.sort_by(|a, b| b.0.cmp(&a.0));
    matches
        .into_iter()
        .take(5)
        .map(|(_, name, kind)| format!("{name} ({kind})"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn exact_beats_substring_beats_overlap() {
        let exact = fuzzy_score("download", "download");
        let substring = fuzzy_score("download", "download_manager");
        let overlap = fuzzy_score("download", "loaddown");
        assert_eq!(exact, 1000);
        assert_eq!(substring, 500);
        assert!(substring > overlap);
        assert!(overlap > 0);
    }

    #[test]
    fn length_difference_penalizes() {
        let close = fuzzy_score("auth", "auth0");
        let far = fuzzy_score("auth", "authentication_service_provider");
        assert!(close > far);
    }

    #[test]
    fn suggestions_are_capped_and_labelled() {
        let index = KbIndex {
            functions_by_name: ["download_file", "download_all", "downloads", "load", "reload", "unload"]
                .iter()
                .map(|n| (n.to_string(), vec!["src/dl.py:1".to_string()]))
                .collect(),
            types_by_name: [("Downloader".to_string(), vec!["src/dl.py:9".to_string()])]
                .into_iter()
                .collect(),
            functions_calling: HashMap::new(),
        };

        let suggestions = fuzzy_suggestions("download", &index);
        assert!(suggestions.len() <= 5);
        assert!(suggestions
            .iter()
            .any(|s| s == "download_file (function)" || s == "download_all (function)"));
        assert!(suggestions.iter().any(|s| s.ends_with("(type)")));
    }
}
