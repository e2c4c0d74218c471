/// Lowercase, trim, and collapse runs of whitespace to a single space.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(normalize_text("  Hola\n\tQUIERO   turno "), "hola quiero turno");
        assert_eq!(normalize_text("ÑANDÚ"), "ñandú");
        assert_eq!(normalize_text("   "), "");
    }
}
