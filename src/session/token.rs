// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection tokens.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a generated token, in characters.
pub const TOKEN_LENGTH: usize = 64;

/// Opaque bearer credential identifying one active hostname-to-wallet
/// connection. The sole credential a third-party application holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Generates an unguessable 64-character token from the OS RNG.
    pub fn generate() -> Self {
        let value: String = (&mut OsRng)
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Token(value)
    }

    pub fn new(value: impl Into<String>) -> Self {
        Token(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shortened form for logs. Tokens are credentials and are never
    /// logged in full.
    pub fn short(&self) -> String {
        if self.0.len() <= 8 {
            return self.0.clone();
        }
        format!("{}..{}", &self.0[..4], &self.0[self.0.len() - 4..])
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_64_alphanumeric_characters() {
        let token = Token::generate();
        assert_eq!(token.as_str().len(), TOKEN_LENGTH);
        assert!(token.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(Token::generate()));
        }
    }

    #[test]
    fn display_never_reveals_the_full_token() {
        let token = Token::generate();
        let shown = token.to_string();
        assert!(shown.len() < TOKEN_LENGTH);
        assert!(!shown.contains(&token.as_str()[4..TOKEN_LENGTH - 4]));
    }
}
