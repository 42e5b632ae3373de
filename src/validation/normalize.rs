//! Whitespace normalization.

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text, uppercased for pattern matching.
pub fn normalize_upper(raw: &str) -> String {
    normalize(raw).to_uppercase()
}

/// Uppercase with accents on vowels removed (`Ü` included); `Ñ` is kept.
pub fn fold_accents(text: &str) -> String {
    text.chars()
        .flat_map(char::to_uppercase)
        .map(|c| match c {
            'Á' | 'À' => 'A',
            'É' | 'È' => 'E',
            'Í' | 'Ì' => 'I',
            'Ó' | 'Ò' => 'O',
            'Ú' | 'Ù' | 'Ü' => 'U',
            other => other,
        })
        .collect()
}
