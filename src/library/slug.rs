//! URL-safe slugs for category names.

const FALLBACK_SLUG: &str = "category";

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ł' => "l",
        'ñ' | 'ń' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'œ' => "oe",
        'š' | 'ś' => "s",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => "u",
        'ý' | 'ÿ' => "y",
        'ž' | 'ź' | 'ż' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Lower-cases `name`, drops punctuation and joins the remaining words with
/// single hyphens. The result only contains `[a-z0-9-]` and never starts or
/// ends with a hyphen; an empty result becomes `"category"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let piece: Option<String> = if c.is_ascii_alphanumeric() {
            Some(c.to_string())
        } else if let Some(folded) = fold_char(c) {
            Some(folded.to_string())
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
            None
        } else if c == '@' {
            pending_separator = true;
            Some("at".to_string())
        } else {
            None
        };

        if let Some(piece) = piece {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = c == '@';
            slug.push_str(&piece);
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Candidate slugs for `base`: `base`, `base-2`, `base-3`, ...
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((2..).map(move |n| format!("{}-{}", base, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_joins_words() {
        assert_eq!(slugify("Board Games"), "board-games");
        assert_eq!(slugify("  GAMES  "), "games");
        assert_eq!(slugify("TV   Series"), "tv-series");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(slugify("Movies!"), "movies");
        assert_eq!(slugify("Sci-Fi & Fantasy"), "sci-fi-fantasy");
        assert_eq!(slugify("Rock 'n' Roll"), "rock-n-roll");
        assert_eq!(slugify("--weird__name--"), "weird-name");
    }

    #[test]
    fn folds_common_accents() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("Straße"), "strasse");
    }

    #[test]
    fn replaces_at_sign() {
        assert_eq!(slugify("Games@Home"), "games-at-home");
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        assert_eq!(slugify("!!!"), "category");
        assert_eq!(slugify("日本"), "category");
    }

    #[test]
    fn candidates_append_counters() {
        let candidates: Vec<String> = slug_candidates("games").take(3).collect();
        assert_eq!(candidates, vec!["games", "games-2", "games-3"]);
    }
}
