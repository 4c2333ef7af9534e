//! # Matcher de Padrões de Token
//!
//! Avalia todos os padrões compilados em todas as posições de uma sequência de
//! tokens (normalmente uma janela de contexto) e devolve **todas** as
//! correspondências, sem filtro: vários padrões podem casar o mesmo trecho ou
//! trechos sobrepostos. Quem escolhe é o resolvedor de sobreposições.
//!
//! ## Algoritmo
//!
//! Para cada posição inicial e cada padrão, os predicados são avaliados da
//! esquerda para a direita, de forma gulosa:
//!
//! - o predicado casa o token atual → consome o token;
//! - não casa, mas é opcional → é pulado sem consumir;
//! - não casa e é obrigatório → o padrão falha nesta posição.
//!
//! Não há alternância dentro de um padrão, logo não há retrocesso. O custo é
//! limitado por `tokens × padrões × tamanho do padrão`.

use serde::Serialize;

use crate::compiler::{CompiledPattern, CompiledTable};
use crate::pattern::PatternId;
use crate::tokenizer::Token;

/// Uma correspondência crua.
///
/// `start..end` é semiaberto e relativo à sequência passada ao matcher.
/// `consumed[i]` indica se o predicado `i` do padrão consumiu um token; o
/// extrator usa isso para separar marcador e valor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMatch {
    pub pattern: PatternId,
    pub start: usize,
    pub end: usize,
    pub consumed: Vec<bool>,
}

impl RawMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Todas as correspondências de `table` em `tokens`, ordenadas por início e
/// depois por índice do padrão.
pub fn find_matches(tokens: &[Token], table: &CompiledTable) -> Vec<RawMatch> {
    let mut matches = Vec::new();
    for start in 0..tokens.len() {
        for pattern in table.patterns() {
            if let Some(m) = match_at(pattern, tokens, start) {
                matches.push(m);
            }
        }
    }
    matches
}

/// Tenta casar `pattern` começando em `start`.
fn match_at(pattern: &CompiledPattern, tokens: &[Token], start: usize) -> Option<RawMatch> {
    let mut pos = start;
    let mut consumed = Vec::with_capacity(pattern.predicates.len());

    for predicate in &pattern.predicates {
        if tokens.get(pos).is_some_and(|token| predicate.matches(token)) {
            consumed.push(true);
            pos += 1;
        } else if predicate.optional {
            consumed.push(false);
        } else {
            return None;
        }
    }

    // padrão só de opcionais que não consumiu nada
    if pos == start {
        return None;
    }
    Some(RawMatch { pattern: pattern.id, start, end: pos, consumed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::pattern::{caliber_table, serial_number_table, AttributeKind, PatternDef, PatternTable, PredicateDef};
    use crate::tokenizer::tokenize;

    fn table(patterns: Vec<PatternDef>) -> CompiledTable {
        compile(&PatternTable { kind: AttributeKind::SerialNumber, patterns, value_regex: None })
    }

    #[test]
    fn test_optional_predicate_consumes_zero_or_one() {
        let compiled = table(vec![PatternDef::new(vec![
            PredicateDef::text("№"),
            PredicateDef::text(":").optional(),
            PredicateDef::regex(r"\d+"),
        ])]);

        let with_colon = find_matches(&tokenize("№: 123"), &compiled);
        assert_eq!(with_colon.len(), 1);
        assert_eq!((with_colon[0].start, with_colon[0].end), (0, 3));
        assert_eq!(with_colon[0].consumed, vec![true, true, true]);

        let without = find_matches(&tokenize("№ 123"), &compiled);
        assert_eq!((without[0].start, without[0].end), (0, 2));
        assert_eq!(without[0].consumed, vec![true, false, true]);
    }

    #[test]
    fn test_matches_are_exhaustive_and_unfiltered() {
        let compiled = compile(&serial_number_table());
        let matches = find_matches(&tokenize("№ 123456"), &compiled);
        // "№" + token único, com e sem ":" opcional
        let indices: Vec<usize> = matches.iter().map(|m| m.pattern.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(matches.iter().all(|m| m.start == 0 && m.end == 2));
    }

    #[test]
    fn test_all_start_positions_are_tried() {
        let compiled = table(vec![PatternDef::new(vec![PredicateDef::regex(r"\d+")])]);
        let matches = find_matches(&tokenize("1 a 2 b 3"), &compiled);
        let starts: Vec<usize> = matches.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 2, 4]);
    }

    #[test]
    fn test_pattern_of_only_optionals_never_matches_empty() {
        let compiled = table(vec![PatternDef::new(vec![PredicateDef::text(":").optional()])]);
        assert!(find_matches(&tokenize("a b"), &compiled).is_empty());
    }

    #[test]
    fn test_caliber_with_unit() {
        let compiled = compile(&caliber_table());
        let matches = find_matches(&tokenize("калібр 7.62 мм"), &compiled);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern.index, 0);
        assert_eq!(matches[0].end, 3);
        assert_eq!(matches[0].consumed, vec![true, false, true, true]);
    }

    #[test]
    fn test_empty_table_yields_nothing() {
        let compiled = table(vec![]);
        assert!(find_matches(&tokenize("№ 1"), &compiled).is_empty());
    }
}
