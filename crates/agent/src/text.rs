//! Accent folding and word-level matching for the rule passes.

/// Lower-cases and folds Spanish accents so `Agrégame` and `agregame` compare equal.
/// Punctuation becomes whitespace; `/` is kept so ratings like `4/5` survive.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            '\'' | '’' => '\'',
            c if c.is_alphanumeric() || c == '/' => c,
            _ => ' ',
        };
        out.push(folded);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|token| !token.is_empty()).collect()
}

/// True when `phrase` occurs in `normalized` on word boundaries. Both sides must already
/// be normalized.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let padded = format!(" {normalized} ");
    padded.contains(&format!(" {phrase} "))
}

pub fn contains_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| contains_phrase(normalized, phrase))
}

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("un", 1),
    ("una", 1),
    ("uno", 1),
    ("dos", 2),
    ("tres", 3),
    ("cuatro", 4),
    ("cinco", 5),
    ("seis", 6),
    ("siete", 7),
    ("ocho", 8),
    ("nueve", 9),
    ("diez", 10),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

/// Reads a quantity token: digits, `x2`/`2x`, or a Spanish/English number word.
pub fn quantity_token(token: &str) -> Option<u32> {
    let digits = token.trim_start_matches('x').trim_end_matches('x');
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.parse().ok();
    }
    NUMBER_WORDS.iter().find(|(word, _)| *word == token).map(|(_, value)| *value)
}

pub fn has_quantity(normalized: &str) -> bool {
    tokens(normalized).into_iter().any(|token| quantity_token(token).is_some())
}

/// Singular/plural tolerant token equality (`pizza` ~ `pizzas`, `pan` ~ `panes`).
pub fn same_word(left: &str, right: &str) -> bool {
    left == right || is_plural_of(left, right) || is_plural_of(right, left)
}

fn is_plural_of(plural: &str, singular: &str) -> bool {
    match plural.strip_prefix(singular) {
        Some("s") | Some("es") => singular.len() >= 3,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_phrase, normalize, quantity_token, same_word};

    #[test]
    fn folds_accents_and_punctuation() {
        assert_eq!(normalize("¡Agrégame UNA bebida, por favor!"), "agregame una bebida por favor");
        assert_eq!(normalize("Nada más."), "nada mas");
        assert_eq!(normalize("Panadería Doña Rosa"), "panaderia dona rosa");
    }

    #[test]
    fn phrases_match_on_word_boundaries_only() {
        let text = normalize("quiero una pizza sin cebolla");
        assert!(contains_phrase(&text, "sin"));
        assert!(!contains_phrase(&text, "si"));
        assert!(contains_phrase(&text, "una pizza"));
    }

    #[test]
    fn quantities_from_digits_and_words() {
        assert_eq!(quantity_token("2"), Some(2));
        assert_eq!(quantity_token("x3"), Some(3));
        assert_eq!(quantity_token("una"), Some(1));
        assert_eq!(quantity_token("diez"), Some(10));
        assert_eq!(quantity_token("pizza"), None);
    }

    #[test]
    fn plural_tolerant_words() {
        assert!(same_word("pizzas", "pizza"));
        assert!(same_word("postres", "postre"));
        assert!(same_word("empanadas", "empanada"));
        assert!(!same_word("pan", "pasta"));
    }
}
