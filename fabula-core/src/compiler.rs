//! # Compilador de Padrões
//!
//! Normaliza uma [`PatternTable`] para a forma que o matcher consome:
//!
//! - cada regex é compilado **uma vez**, ancorado como casamento completo;
//! - `LOWER` vira um conjunto de formas minúsculas;
//! - as dicas de extração (`ROLE`) são removidas.
//!
//! Um padrão malformado é registrado em log e excluído; os demais compilam
//! normalmente. O resultado depende só da tabela, então compilar duas vezes
//! produz o mesmo [`CompiledTable`].

use std::collections::HashSet;

use regex::Regex;
use tracing::error;

use crate::error::{CompileError, CompileErrorReason};
use crate::pattern::{AttributeKind, LengthBound, PatternDef, PatternId, PatternTable, PredicateDef, ValueSpec};
use crate::tokenizer::Token;

/// Teste de um único token.
#[derive(Debug, Clone)]
pub enum TokenTest {
    /// Texto cru idêntico
    Text(String),
    /// Texto cru pertence ao conjunto
    TextIn(HashSet<String>),
    /// Forma minúscula pertence ao conjunto (já em minúsculas)
    LowerIn(HashSet<String>),
    /// Regex ancorado sobre o texto cru
    Regex(Regex),
}

#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    pub test: TokenTest,
    pub optional: bool,
    pub length: Option<LengthBound>,
}

impl CompiledPredicate {
    pub fn matches(&self, token: &Token) -> bool {
        if let Some(bound) = self.length {
            let len = token.text.chars().count();
            if bound.min.is_some_and(|min| len < min) || bound.max.is_some_and(|max| len > max) {
                return false;
            }
        }
        match &self.test {
            TokenTest::Text(text) => token.text == *text,
            TokenTest::TextIn(set) => set.contains(&token.text),
            TokenTest::LowerIn(set) => set.contains(&token.lower),
            TokenTest::Regex(re) => re.is_match(&token.text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub id: PatternId,
    pub predicates: Vec<CompiledPredicate>,
}

/// Tabela pronta para o matcher.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    kind: AttributeKind,
    patterns: Vec<CompiledPattern>,
    value_regex: Option<Regex>,
    errors: Vec<CompileError>,
}

impl CompiledTable {
    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Regex auxiliar para tokens fundidos (sem âncoras).
    pub fn value_regex(&self) -> Option<&Regex> {
        self.value_regex.as_ref()
    }

    /// Padrões descartados na compilação.
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compila a tabela inteira; padrões inválidos são descartados individualmente.
pub fn compile(table: &PatternTable) -> CompiledTable {
    let mut patterns = Vec::with_capacity(table.len());
    let mut errors = Vec::new();

    for (index, def) in table.patterns.iter().enumerate() {
        let id = PatternId { kind: table.kind, index };
        match compile_pattern(def) {
            Ok(predicates) => patterns.push(CompiledPattern { id, predicates }),
            Err(reason) => {
                let err = CompileError { kind: table.kind, index: Some(index), reason };
                error!("{}; padrão descartado", err);
                errors.push(err);
            }
        }
    }

    let value_regex = match table.value_regex.as_deref().map(Regex::new) {
        Some(Ok(re)) => Some(re),
        Some(Err(e)) => {
            let err = CompileError {
                kind: table.kind,
                index: None,
                reason: CompileErrorReason::InvalidValueRegex(e.to_string()),
            };
            error!("{}; tokens fundidos usarão o texto inteiro", err);
            errors.push(err);
            None
        }
        None => None,
    };

    CompiledTable { kind: table.kind, patterns, value_regex, errors }
}

fn compile_pattern(def: &PatternDef) -> Result<Vec<CompiledPredicate>, CompileErrorReason> {
    if def.predicates.is_empty() {
        return Err(CompileErrorReason::EmptyPattern);
    }
    def.predicates
        .iter()
        .enumerate()
        .map(|(i, predicate)| compile_predicate(i, predicate))
        .collect()
}

fn compile_predicate(i: usize, def: &PredicateDef) -> Result<CompiledPredicate, CompileErrorReason> {
    let optional = match def.op.as_deref() {
        None => false,
        Some("?") => true,
        Some(other) => return Err(CompileErrorReason::UnsupportedOperator(i, other.to_string())),
    };

    if let Some(LengthBound { min: Some(min), max: Some(max) }) = def.length {
        if min > max {
            return Err(CompileErrorReason::InvalidLength(i));
        }
    }

    let test = match (&def.text, &def.lower) {
        (None, None) => return Err(CompileErrorReason::MissingMode(i)),
        (Some(_), Some(_)) => return Err(CompileErrorReason::AmbiguousMode(i)),
        (Some(ValueSpec::Exact(text)), None) => TokenTest::Text(text.clone()),
        (Some(ValueSpec::In { values }), None) => TokenTest::TextIn(non_empty_set(i, values.iter().cloned())?),
        (Some(ValueSpec::Regex { pattern }), None) => {
            let anchored = format!("^(?:{pattern})$");
            let re = Regex::new(&anchored).map_err(|e| CompileErrorReason::InvalidRegex(i, e.to_string()))?;
            TokenTest::Regex(re)
        }
        (None, Some(ValueSpec::Exact(text))) => TokenTest::LowerIn(HashSet::from([text.to_lowercase()])),
        (None, Some(ValueSpec::In { values })) => {
            TokenTest::LowerIn(non_empty_set(i, values.iter().map(|v| v.to_lowercase()))?)
        }
        (None, Some(ValueSpec::Regex { .. })) => return Err(CompileErrorReason::UnsupportedRegexOnLower(i)),
    };

    Ok(CompiledPredicate { test, optional, length: def.length })
}

fn non_empty_set(i: usize, values: impl Iterator<Item = String>) -> Result<HashSet<String>, CompileErrorReason> {
    let set: HashSet<String> = values.collect();
    if set.is_empty() {
        return Err(CompileErrorReason::EmptySet(i));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{caliber_table, serial_number_table, ValueRole};
    use crate::tokenizer::tokenize;

    fn table(patterns: Vec<PatternDef>) -> PatternTable {
        PatternTable { kind: AttributeKind::SerialNumber, patterns, value_regex: None }
    }

    #[test]
    fn test_builtin_tables_compile_cleanly() {
        let serial = compile(&serial_number_table());
        assert!(serial.errors().is_empty());
        assert_eq!(serial.patterns().len(), 42);

        let caliber = compile(&caliber_table());
        assert!(caliber.errors().is_empty());
        assert_eq!(caliber.patterns().len(), 10);
        assert!(caliber.value_regex().is_some());
    }

    #[test]
    fn test_bad_pattern_is_dropped_others_survive() {
        let compiled = compile(&table(vec![
            PatternDef::new(vec![PredicateDef::text("№")]),
            PatternDef::new(vec![PredicateDef::regex("(unclosed")]),
            PatternDef::new(vec![PredicateDef::lower("номер")]),
        ]));
        assert_eq!(compiled.patterns().len(), 2);
        assert_eq!(compiled.patterns()[1].id.index, 2);
        assert_eq!(compiled.errors().len(), 1);
        assert_eq!(compiled.errors()[0].index, Some(1));
        assert!(matches!(compiled.errors()[0].reason, CompileErrorReason::InvalidRegex(0, _)));
    }

    #[test]
    fn test_predicate_mode_validation() {
        let both = PredicateDef { lower: Some(ValueSpec::Exact("н".into())), ..PredicateDef::text("н") };
        let lower_regex = PredicateDef { lower: Some(ValueSpec::Regex { pattern: "н".into() }), ..PredicateDef::default() };
        let bad_op = PredicateDef { op: Some("+".into()), ..PredicateDef::text("н") };
        let empty_set = PredicateDef::text_in(&[]);
        let inverted_length =
            PredicateDef { length: Some(LengthBound { min: Some(20), max: Some(2) }), ..PredicateDef::text("н") };

        let compiled = compile(&table(vec![
            PatternDef::new(vec![PredicateDef::default()]),
            PatternDef::new(vec![both]),
            PatternDef::new(vec![lower_regex]),
            PatternDef::new(vec![bad_op]),
            PatternDef::new(vec![empty_set]),
            PatternDef::new(vec![PredicateDef::text("№"), inverted_length]),
            PatternDef::new(vec![]),
        ]));
        let reasons: Vec<CompileErrorReason> = compiled.errors().iter().map(|e| e.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                CompileErrorReason::MissingMode(0),
                CompileErrorReason::AmbiguousMode(0),
                CompileErrorReason::UnsupportedRegexOnLower(0),
                CompileErrorReason::UnsupportedOperator(0, "+".into()),
                CompileErrorReason::EmptySet(0),
                CompileErrorReason::InvalidLength(1),
                CompileErrorReason::EmptyPattern,
            ]
        );
        assert!(compiled.is_empty());
    }

    #[test]
    fn test_regex_is_full_match() {
        let compiled = compile(&table(vec![PatternDef::new(vec![PredicateDef::regex(r"\d{2}")])]));
        let predicate = &compiled.patterns()[0].predicates[0];
        let tokens = tokenize("12 123 a12");
        assert!(predicate.matches(&tokens[0]));
        assert!(!predicate.matches(&tokens[1]));
        assert!(!predicate.matches(&tokens[2]));
    }

    #[test]
    fn test_lower_is_case_insensitive_and_role_is_stripped() {
        let def = PredicateDef::lower("Номер").with_role(ValueRole::Value);
        let compiled = compile(&table(vec![PatternDef::new(vec![def])]));
        let tokens = tokenize("НОМЕР номер");
        let predicate = &compiled.patterns()[0].predicates[0];
        assert!(predicate.matches(&tokens[0]));
        assert!(predicate.matches(&tokens[1]));
    }

    #[test]
    fn test_serial_suffix_length_bound() {
        let compiled = compile(&serial_number_table());
        // padrão 2: "№" ":"? prefixo sufixo
        let suffix = &compiled.patterns()[2].predicates[3];
        let tokens = tokenize("12 1 123456789012345678901 AB-12");
        assert!(suffix.matches(&tokens[0]));
        assert!(!suffix.matches(&tokens[1]));
        assert!(!suffix.matches(&tokens[2]));
        assert!(suffix.matches(&tokens[3]));
    }

    #[test]
    fn test_invalid_value_regex_is_reported() {
        let mut broken = caliber_table();
        broken.value_regex = Some("(".into());
        let compiled = compile(&broken);
        assert!(compiled.value_regex().is_none());
        assert_eq!(compiled.patterns().len(), 10);
        assert_eq!(compiled.errors().len(), 1);
        assert_eq!(compiled.errors()[0].index, None);
        assert!(matches!(compiled.errors()[0].reason, CompileErrorReason::InvalidValueRegex(_)));
    }
}
