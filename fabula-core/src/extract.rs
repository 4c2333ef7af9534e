//! # Extração de Valores
//!
//! Transforma uma correspondência crua num [`Candidate`]: o trecho casado, seu
//! span em caracteres e o **valor** semântico (o número de série, a expressão
//! numérica do calibre).
//!
//! ## Padrões de vários tokens
//!
//! O padrão é percorrido de trás para frente usando o alinhamento do matcher:
//!
//! 1. tokens consumidos por predicados finais que não são de valor (unidade
//!    "мм", marcador "калібру") são pulados;
//! 2. conta-se a sequência de predicados `value` que vem em seguida;
//! 3. esses tokens formam o valor.
//!
//! `калібр 7.62 мм` → `7.62`; `№ 123456` → `123456`; `7.62 калібру` → `7.62`.
//!
//! ## Tokens fundidos
//!
//! Quando marcador e valor chegam num único token (`к7.62мм`), o regex auxiliar
//! da tabela isola o núcleo do valor (`7.62мм`).
//!
//! ## Fallback
//!
//! Se a fronteira marcador/valor não puder ser determinada, o valor é o
//! segmento inteiro. A falha é registrada em log e nunca propagada.

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::document::Document;
use crate::error::ExtractionError;
use crate::matcher::RawMatch;
use crate::pattern::{PatternDef, PatternId, ValueRole};

/// Correspondência com valor extraído, ainda sujeita à resolução de sobreposições.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub pattern: PatternId,
    pub start_token: usize,
    pub end_token: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub segment_text: String,
    pub value: String,
}

impl Candidate {
    /// Comprimento em caracteres.
    pub fn char_len(&self) -> usize {
        self.end_char - self.start_char
    }
}

/// Monta o candidato de `raw` (índices absolutos de token).
///
/// Retorna `None` apenas se o intervalo não existir no documento.
pub fn build_candidate(doc: &Document, raw: &RawMatch, pattern: &PatternDef, value_regex: Option<&Regex>) -> Option<Candidate> {
    let segment_text = doc.segment_text(raw.start, raw.end)?.to_string();
    let start_char = doc.tokens[raw.start].start;
    let end_char = doc.tokens[raw.end - 1].end;

    let value = match isolate_value(doc, raw, pattern, value_regex) {
        Ok(value) => value,
        Err(e) => {
            warn!(pattern = %raw.pattern, "valor não isolado em {:?} ({}); usando o segmento inteiro", segment_text, e);
            segment_text.clone()
        }
    };

    Some(Candidate {
        pattern: raw.pattern,
        start_token: raw.start,
        end_token: raw.end,
        start_char,
        end_char,
        segment_text,
        value,
    })
}

/// Isola o valor; qualquer erro significa "usar o segmento inteiro".
pub fn isolate_value(
    doc: &Document,
    raw: &RawMatch,
    pattern: &PatternDef,
    value_regex: Option<&Regex>,
) -> Result<String, ExtractionError> {
    if pattern.is_fused() {
        let re = value_regex.ok_or(ExtractionError::MissingValueRegex)?;
        let token = doc.tokens.get(raw.start).ok_or(ExtractionError::MisalignedMatch)?;
        return re
            .find(&token.text)
            .map(|m| m.as_str())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(ExtractionError::FusedValueNotFound);
    }

    if raw.consumed.len() != pattern.predicates.len() {
        return Err(ExtractionError::MisalignedMatch);
    }

    let mut trailing = 0;
    let mut value_tokens = 0;
    let mut in_value_run = false;
    for (predicate, &took) in pattern.predicates.iter().zip(&raw.consumed).rev() {
        if predicate.role == ValueRole::Value {
            in_value_run = true;
            value_tokens += usize::from(took);
        } else if in_value_run {
            break;
        } else {
            trailing += usize::from(took);
        }
    }

    if value_tokens == 0 {
        return Err(ExtractionError::NoValuePredicates);
    }
    if raw.len() < trailing + value_tokens {
        return Err(ExtractionError::SegmentTooShort { segment: raw.len(), expected: trailing + value_tokens });
    }

    let last = raw.end - trailing;
    let first = last - value_tokens;
    doc.segment_text(first, last)
        .map(str::to_string)
        .ok_or(ExtractionError::MisalignedMatch)
}
