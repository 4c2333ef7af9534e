//! # Documento e Entidades
//!
//! Visão somente-leitura sobre um texto tokenizado: os tokens (de posse
//! exclusiva do documento) e os spans de entidade produzidos pelo modelo NER.
//! Nada aqui é alterado depois da construção; o núcleo de extração apenas lê.

use serde::{Deserialize, Serialize};

use crate::tokenizer::{tokenize, Token};

/// Uma entidade reconhecida (ex: "пістолет" → `WEAPON_FIREARM`).
///
/// `start_token..end_token` é um intervalo semiaberto de índices de token;
/// `start_char..end_char` são offsets em caracteres derivados dos tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: String,
    pub start_token: usize,
    pub end_token: usize,
    pub start_char: usize,
    pub end_char: usize,
}

impl EntitySpan {
    /// Monta o span a partir de um intervalo de tokens.
    ///
    /// Retorna `None` se o intervalo for vazio ou sair dos limites.
    pub fn from_tokens(text: &str, tokens: &[Token], start_token: usize, end_token: usize, label: &str) -> Option<Self> {
        if start_token >= end_token || end_token > tokens.len() {
            return None;
        }
        let first = &tokens[start_token];
        let last = &tokens[end_token - 1];
        Some(Self {
            text: text.get(first.byte_start..last.byte_end)?.to_string(),
            label: label.to_string(),
            start_token,
            end_token,
            start_char: first.start,
            end_char: last.end,
        })
    }
}

/// Texto tokenizado com suas entidades.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub tokens: Vec<Token>,
    pub entities: Vec<EntitySpan>,
}

impl Document {
    pub fn new(text: impl Into<String>, tokens: Vec<Token>, entities: Vec<EntitySpan>) -> Self {
        Self { text: text.into(), tokens, entities }
    }

    /// Tokeniza com o tokenizador de referência, sem entidades.
    pub fn from_text(text: &str) -> Self {
        Self::new(text, tokenize(text), Vec::new())
    }

    /// Acrescenta uma entidade sobre `start_token..end_token`.
    ///
    /// Intervalos inválidos são ignorados.
    pub fn with_entity(mut self, start_token: usize, end_token: usize, label: &str) -> Self {
        if let Some(span) = EntitySpan::from_tokens(&self.text, &self.tokens, start_token, end_token, label) {
            self.entities.push(span);
        }
        self
    }

    /// Número de tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Comprimento do texto em caracteres.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Texto original coberto pelos tokens `start..end` (espaços internos preservados).
    pub fn segment_text(&self, start: usize, end: usize) -> Option<&str> {
        if start >= end || end > self.tokens.len() {
            return None;
        }
        self.text.get(self.tokens[start].byte_start..self.tokens[end - 1].byte_end)
    }
}
