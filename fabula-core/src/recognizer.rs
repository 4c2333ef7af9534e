//! # Reconhecedor de Entidades
//!
//! O núcleo de extração não reconhece entidades: recebe um [`Document`] já com
//! os spans de menção a armas. [`EntityRecognizer`] é a costura para o modelo
//! NER externo.
//!
//! [`LexiconRecognizer`] é o reconhecedor embutido, determinístico: um
//! gazetteer de radicais sobre o vocabulário de armas. O ucraniano é
//! flexionado ("пістолет", "пістолета", "пістолетом"), então cada palavra casa
//! pelo radical seguido de uma terminação curta. Termos mais longos são
//! testados primeiro, assim "гранатомет" não vira "граната".

use crate::document::Document;
use crate::error::RecognizeError;
use crate::tokenizer::tokenize;

/// Tokeniza um texto e localiza as entidades.
///
/// Deve ser determinístico para o mesmo texto e a mesma versão do modelo.
pub trait EntityRecognizer: Send + Sync {
    /// Nome do modelo (exposto no health check).
    fn name(&self) -> &str;

    fn recognize(&self, text: &str) -> Result<Document, RecognizeError>;
}

pub const LABEL_FIREARM: &str = "WEAPON_FIREARM";
pub const LABEL_HEAVY: &str = "WEAPON_HEAVY";
pub const LABEL_EXPLOSIVE: &str = "WEAPON_EXPLOSIVE";
pub const LABEL_SPECIAL: &str = "WEAPON_SPECIAL";

/// Maior terminação aceita depois do radical.
const MAX_ENDING_CHARS: usize = 4;

/// Vocabulário embutido: rótulo e frase de radicais. Alternativas de um mesmo
/// radical são separadas por `|`.
const WEAPON_LEXICON: &[(&str, &str)] = &[
    (LABEL_FIREARM, "пістолет"),
    (LABEL_FIREARM, "револьвер"),
    (LABEL_FIREARM, "рушниц"),
    (LABEL_FIREARM, "карабін"),
    (LABEL_FIREARM, "гвинтівк"),
    (LABEL_FIREARM, "автомат"),
    (LABEL_FIREARM, "кулемет"),
    (LABEL_FIREARM, "обріз"),
    (LABEL_HEAVY, "гранатомет"),
    (LABEL_HEAVY, "міномет"),
    (LABEL_HEAVY, "гармат"),
    (LABEL_HEAVY, "зенітн установк"),
    (LABEL_EXPLOSIVE, "вибухівк"),
    (LABEL_EXPLOSIVE, "гранат"),
    (LABEL_SPECIAL, "спеціальн засіб|засоб"),
];

#[derive(Debug, Clone)]
struct Term {
    label: String,
    /// Uma lista de radicais alternativos por palavra
    words: Vec<Vec<String>>,
}

impl Term {
    fn parse(label: &str, phrase: &str) -> Option<Self> {
        let words: Vec<Vec<String>> = phrase
            .split_whitespace()
            .map(|word| word.split('|').map(|stem| stem.to_lowercase()).collect())
            .collect();
        if words.is_empty() {
            return None;
        }
        Some(Self { label: label.to_string(), words })
    }

    fn stem_chars(&self) -> usize {
        self.words.iter().map(|alts| alts.iter().map(|s| s.chars().count()).max().unwrap_or(0)).sum()
    }
}

fn word_matches(lower: &str, stems: &[String]) -> bool {
    stems.iter().any(|stem| {
        lower
            .strip_prefix(stem.as_str())
            .is_some_and(|ending| ending.chars().count() <= MAX_ENDING_CHARS && ending.chars().all(char::is_alphabetic))
    })
}

/// Gazetteer de radicais.
#[derive(Debug, Clone)]
pub struct LexiconRecognizer {
    /// Ordenado do termo mais longo para o mais curto
    terms: Vec<Term>,
}

impl Default for LexiconRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconRecognizer {
    /// Reconhecedor com o vocabulário de armas embutido.
    pub fn new() -> Self {
        let mut recognizer = Self::empty();
        for (label, phrase) in WEAPON_LEXICON {
            recognizer.add_term(label, phrase);
        }
        recognizer
    }

    pub fn empty() -> Self {
        Self { terms: Vec::new() }
    }

    /// Acrescenta um termo (palavras separadas por espaço, alternativas por `|`).
    pub fn add_term(&mut self, label: &str, phrase: &str) {
        if let Some(term) = Term::parse(label, phrase) {
            self.terms.push(term);
            self.terms.sort_by_key(|t| std::cmp::Reverse((t.words.len(), t.stem_chars())));
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn term_at(&self, doc: &Document, i: usize) -> Option<&Term> {
        self.terms.iter().find(|term| {
            let end = i + term.words.len();
            end <= doc.len() && term.words.iter().zip(&doc.tokens[i..end]).all(|(stems, t)| word_matches(&t.lower, stems))
        })
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn recognize(&self, text: &str) -> Result<Document, RecognizeError> {
        if text.trim().is_empty() {
            return Err(RecognizeError::EmptyText);
        }
        let mut doc = Document::new(text, tokenize(text), Vec::new());

        let mut i = 0;
        while i < doc.len() {
            match self.term_at(&doc, i) {
                Some(term) => {
                    let end = i + term.words.len();
                    doc = doc.with_entity(i, end, &term.label);
                    i = end;
                }
                None => i += 1,
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str) -> Vec<(String, String)> {
        let doc = LexiconRecognizer::new().recognize(text).unwrap();
        doc.entities.into_iter().map(|e| (e.text, e.label)).collect()
    }

    #[test]
    fn test_inflected_forms() {
        assert_eq!(
            labels("Вилучено пістолета та дві гвинтівки"),
            vec![("пістолета".to_string(), LABEL_FIREARM.to_string()), ("гвинтівки".to_string(), LABEL_FIREARM.to_string())]
        );
    }

    #[test]
    fn test_longest_term_wins() {
        assert_eq!(labels("гранатомет"), vec![("гранатомет".to_string(), LABEL_HEAVY.to_string())]);
        assert_eq!(labels("гранати"), vec![("гранати".to_string(), LABEL_EXPLOSIVE.to_string())]);
    }

    #[test]
    fn test_multi_word_terms() {
        assert_eq!(
            labels("зенітна установка і спеціальних засобів"),
            vec![
                ("зенітна установка".to_string(), LABEL_HEAVY.to_string()),
                ("спеціальних засобів".to_string(), LABEL_SPECIAL.to_string()),
            ]
        );
    }

    #[test]
    fn test_long_endings_are_not_inflections() {
        assert!(labels("автоматичний режим").is_empty());
        assert_eq!(labels("автоматом").len(), 1);
    }

    #[test]
    fn test_entity_offsets() {
        let doc = LexiconRecognizer::new().recognize("знайдено обріз № 12").unwrap();
        let ent = &doc.entities[0];
        assert_eq!((ent.start_token, ent.end_token), (1, 2));
        assert_eq!((ent.start_char, ent.end_char), (9, 14));
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(matches!(LexiconRecognizer::new().recognize("  "), Err(RecognizeError::EmptyText)));
    }

    #[test]
    fn test_custom_terms() {
        let mut recognizer = LexiconRecognizer::empty();
        recognizer.add_term("WEAPON_FIREARM", "ак|акм");
        recognizer.add_term("IGNORED", "   ");
        assert_eq!(recognizer.len(), 1);
        let doc = recognizer.recognize("АКМ № 1").unwrap();
        assert_eq!(doc.entities[0].label, "WEAPON_FIREARM");
    }
}
