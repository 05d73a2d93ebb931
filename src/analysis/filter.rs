//! Token rewriting.

use crate::analysis::Token;

/// Trait for filters applied to the tokens of one text.
pub trait Filter: Send + Sync {
    /// Rewrite, drop or add tokens.
    fn apply(&self, tokens: Vec<Token>) -> Vec<Token>;

    /// Get the name of this filter (for logging).
    fn name(&self) -> &str;
}

/// Lowercases token texts (Unicode-aware).
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn apply(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in &mut tokens {
            if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
        }
        tokens
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_filter() {
        let tokens = vec![Token::new("Hello", 0), Token::new("ŽIVOT", 1), Token::new("ok", 2)];
        let lowered = LowercaseFilter::new().apply(tokens);
        assert_eq!(lowered[0], Token::new("hello", 0));
        assert_eq!(lowered[1].text, "život");
        assert_eq!(lowered[2].text, "ok");
    }
}
