use nanoid::nanoid;

/// Alphabet for saved search identifiers (no ambiguous glyphs).
const SAVED_SEARCH_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const SAVED_SEARCH_ID_LENGTH: usize = 20;

pub fn generate_saved_search_id() -> String {
    nanoid!(SAVED_SEARCH_ID_LENGTH, SAVED_SEARCH_ID_ALPHABET)
}

/// Whether `id` could have come from [`generate_saved_search_id`].
pub fn is_saved_search_id(id: &str) -> bool {
    id.chars().count() == SAVED_SEARCH_ID_LENGTH && id.chars().all(|ch| SAVED_SEARCH_ID_ALPHABET.contains(&ch))
}
