//! # Motor de Extração
//!
//! [`Extractor`] é o contexto imutável do pipeline: guarda as duas tabelas de
//! padrões, suas formas compiladas e a configuração. É construído uma vez na
//! inicialização e compartilhado (`Arc<Extractor>`) por qualquer número de
//! requisições concorrentes; não há estado global nem mutável.
//!
//! ```text
//! Documento + entidades
//!    └─ para cada entidade:
//!         janela ─▶ matcher ─▶ extração de valor ─▶ resolução de sobreposições
//!    └─ concatenação na ordem das entidades
//! ```
//!
//! Cada entidade é tratada isoladamente: o mesmo número perto de duas
//! entidades aparece uma vez para cada, ancorado na respectiva entidade.
//!
//! ## Exemplo
//!
//! ```
//! use fabula_core::{Document, Extractor, EngineConfig};
//!
//! let extractor = Extractor::new(EngineConfig::default());
//! let doc = Document::from_text("вилучено пістолет № 123456 калібр 9 мм")
//!     .with_entity(1, 2, "WEAPON_FIREARM");
//!
//! let serials = extractor.extract_serial_numbers(&doc);
//! assert_eq!(serials[0].value, "123456");
//! let calibers = extractor.extract_calibers(&doc);
//! assert_eq!(calibers[0].value, "9");
//! ```

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::{compile, CompiledTable};
use crate::config::EngineConfig;
use crate::document::{Document, EntitySpan};
use crate::extract::{build_candidate, Candidate};
use crate::pattern::{caliber_table, serial_number_table, AttributeKind, PatternTable};
use crate::resolve::resolve_overlaps;
use crate::window::window_matches;

/// Atributo final, ancorado numa entidade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedAttribute {
    pub kind: AttributeKind,
    pub entity_text: String,
    pub entity_label: String,
    pub entity_start_char: usize,
    pub entity_end_char: usize,
    pub matched_segment_text: String,
    pub matched_segment_start_char: usize,
    pub matched_segment_end_char: usize,
    pub value: String,
}

impl ExtractedAttribute {
    fn new(kind: AttributeKind, entity: &EntitySpan, candidate: Candidate) -> Self {
        Self {
            kind,
            entity_text: entity.text.clone(),
            entity_label: entity.label.clone(),
            entity_start_char: entity.start_char,
            entity_end_char: entity.end_char,
            matched_segment_text: candidate.segment_text,
            matched_segment_start_char: candidate.start_char,
            matched_segment_end_char: candidate.end_char,
            value: candidate.value,
        }
    }
}

/// Resultado completo de um documento.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// `(texto, rótulo)` de cada entidade, na ordem do documento
    pub entities: Vec<(String, String)>,
    pub serial_numbers: Vec<ExtractedAttribute>,
    pub calibers: Vec<ExtractedAttribute>,
}

/// Tabela de padrões junto da sua forma compilada.
#[derive(Debug, Clone)]
struct Table {
    source: PatternTable,
    compiled: CompiledTable,
}

impl Table {
    fn new(source: PatternTable) -> Self {
        let compiled = compile(&source);
        Self { source, compiled }
    }
}

/// Contexto imutável de extração.
#[derive(Debug, Clone)]
pub struct Extractor {
    serial: Table,
    caliber: Table,
    config: EngineConfig,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Extractor {
    /// Extrator com as tabelas embutidas.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_tables(serial_number_table(), caliber_table(), config)
    }

    /// Extrator com tabelas próprias (ex: carregadas de arquivo).
    pub fn with_tables(serial: PatternTable, caliber: PatternTable, config: EngineConfig) -> Self {
        Self { serial: Table::new(serial), caliber: Table::new(caliber), config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn serial_table(&self) -> &CompiledTable {
        &self.serial.compiled
    }

    pub fn caliber_table(&self) -> &CompiledTable {
        &self.caliber.compiled
    }

    pub fn extract_serial_numbers(&self, doc: &Document) -> Vec<ExtractedAttribute> {
        self.extract(doc, &self.serial)
    }

    pub fn extract_calibers(&self, doc: &Document) -> Vec<ExtractedAttribute> {
        self.extract(doc, &self.caliber)
    }

    /// Entidades, números de série e calibres de um documento.
    pub fn analyze(&self, doc: &Document) -> DocumentAnalysis {
        let analysis = DocumentAnalysis {
            entities: doc.entities.iter().map(|e| (e.text.clone(), e.label.clone())).collect(),
            serial_numbers: self.extract_serial_numbers(doc),
            calibers: self.extract_calibers(doc),
        };
        debug!(
            tokens = doc.len(),
            entities = analysis.entities.len(),
            serial_numbers = analysis.serial_numbers.len(),
            calibers = analysis.calibers.len(),
            "documento analisado"
        );
        analysis
    }

    /// Analisa documentos independentes em paralelo; a ordem de saída é a de entrada.
    pub fn analyze_batch(&self, docs: &[Document]) -> Vec<DocumentAnalysis> {
        docs.par_iter().map(|doc| self.analyze(doc)).collect()
    }

    fn extract(&self, doc: &Document, table: &Table) -> Vec<ExtractedAttribute> {
        if table.compiled.is_empty() {
            return Vec::new();
        }
        let kind = table.compiled.kind();
        let value_regex = table.compiled.value_regex();

        let mut attributes = Vec::new();
        for entity in &doc.entities {
            let candidates: Vec<Candidate> = window_matches(doc, entity, &table.compiled, self.config.context_window)
                .iter()
                .filter_map(|raw| {
                    let pattern = table.source.get(raw.pattern)?;
                    build_candidate(doc, raw, pattern, value_regex)
                })
                .collect();

            let before = candidates.len();
            let kept = resolve_overlaps(candidates);
            debug!(entity = %entity.text, %kind, candidates = before, kept = kept.len(), "janela resolvida");

            attributes.extend(kept.into_iter().map(|c| ExtractedAttribute::new(kind, entity, c)));
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternDef, PredicateDef, ValueRole};

    fn extractor() -> Extractor {
        Extractor::default()
    }

    #[test]
    fn test_serial_number_near_entity() {
        let doc = Document::from_text("вилучено пістолет ПМ № 123456").with_entity(1, 2, "WEAPON_FIREARM");
        let serials = extractor().extract_serial_numbers(&doc);
        assert_eq!(serials.len(), 1);
        let serial = &serials[0];
        assert_eq!(serial.kind, AttributeKind::SerialNumber);
        assert_eq!(serial.value, "123456");
        assert_eq!(serial.matched_segment_text, "№ 123456");
        assert_eq!(serial.entity_text, "пістолет");
        assert_eq!(serial.entity_label, "WEAPON_FIREARM");
        assert_eq!((serial.matched_segment_start_char, serial.matched_segment_end_char), (21, 29));
    }

    #[test]
    fn test_prefix_and_suffix_win_over_single_token() {
        let doc = Document::from_text("автомат номер АК 123456").with_entity(0, 1, "WEAPON_FIREARM");
        let serials = extractor().extract_serial_numbers(&doc);
        assert_eq!(serials.len(), 1);
        assert_eq!(serials[0].value, "АК 123456");
        assert_eq!(serials[0].matched_segment_text, "номер АК 123456");
    }

    #[test]
    fn test_caliber_variants() {
        let cases = [
            ("рушниця калібр 12", "12"),
            ("пістолет кал. 9 мм", "9"),
            ("автомат калібр 7.62 х 39 мм", "7.62 х 39"),
            ("карабін к7.62мм", "7.62мм"),
            ("гвинтівка 5.45 калібру", "5.45"),
            ("автомат калібр 7.62Х39", "7.62Х39"),
            ("автомат калібр 7.62X39", "7.62X39"),
            ("автомат 7.62Х39 калібру", "7.62Х39"),
        ];
        for (text, expected) in cases {
            let doc = Document::from_text(text).with_entity(0, 1, "WEAPON_FIREARM");
            let calibers = extractor().extract_calibers(&doc);
            assert_eq!(calibers.len(), 1, "{text}");
            assert_eq!(calibers[0].value, expected, "{text}");
        }
    }

    #[test]
    fn test_each_entity_has_its_own_window() {
        let doc = Document::from_text("пістолет № 111 і револьвер № 222")
            .with_entity(0, 1, "WEAPON_FIREARM")
            .with_entity(4, 5, "WEAPON_FIREARM");
        let serials = extractor().extract_serial_numbers(&doc);
        // com o raio padrão as duas janelas cobrem o texto todo
        let values: Vec<(&str, &str)> = serials.iter().map(|s| (s.entity_text.as_str(), s.value.as_str())).collect();
        assert_eq!(
            values,
            vec![("пістолет", "111"), ("пістолет", "222"), ("револьвер", "111"), ("револьвер", "222")]
        );

        let narrow = Extractor::new(EngineConfig { context_window: 2 });
        let values: Vec<String> = narrow.extract_serial_numbers(&doc).into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec!["111", "222"]);
    }

    #[test]
    fn test_no_entities_no_attributes() {
        let doc = Document::from_text("№ 123456 калібр 9");
        let analysis = extractor().analyze(&doc);
        assert!(analysis.entities.is_empty());
        assert!(analysis.serial_numbers.is_empty());
        assert!(analysis.calibers.is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let doc = Document::from_text("обріз № АБ 12-34 калібр 16, гвинтівка н. 77/1 кал 7,62")
            .with_entity(0, 1, "WEAPON_FIREARM")
            .with_entity(7, 8, "WEAPON_FIREARM");
        let extractor = extractor();
        assert_eq!(extractor.analyze(&doc), extractor.analyze(&doc));
    }

    #[test]
    fn test_no_overlap_within_an_entity() {
        let doc = Document::from_text("пістолет № АБ 123 № 456 номер: 7/8 #9 калібр 9 мм к9мм")
            .with_entity(0, 1, "WEAPON_FIREARM");
        let extractor = extractor();
        for attributes in [extractor.extract_serial_numbers(&doc), extractor.extract_calibers(&doc)] {
            assert!(!attributes.is_empty());
            for (i, a) in attributes.iter().enumerate() {
                for b in &attributes[i + 1..] {
                    assert_ne!(a.matched_segment_start_char, b.matched_segment_start_char);
                    let a_in_b = a.matched_segment_start_char >= b.matched_segment_start_char
                        && a.matched_segment_end_char <= b.matched_segment_end_char;
                    let b_in_a = b.matched_segment_start_char >= a.matched_segment_start_char
                        && b.matched_segment_end_char <= a.matched_segment_end_char;
                    assert!(!a_in_b && !b_in_a);
                }
            }
        }
    }

    #[test]
    fn test_empty_table_yields_nothing() {
        let empty = PatternTable { kind: AttributeKind::SerialNumber, patterns: vec![], value_regex: None };
        let extractor = Extractor::with_tables(empty, caliber_table(), EngineConfig::default());
        let doc = Document::from_text("пістолет № 1").with_entity(0, 1, "WEAPON_FIREARM");
        assert!(extractor.extract_serial_numbers(&doc).is_empty());
    }

    #[test]
    fn test_custom_table_with_broken_pattern_still_extracts() {
        let serial = PatternTable {
            kind: AttributeKind::SerialNumber,
            patterns: vec![
                PatternDef::new(vec![PredicateDef::regex("(")]),
                PatternDef::new(vec![PredicateDef::lower("с/н"), PredicateDef::regex(r"\d+").with_role(ValueRole::Value)]),
            ],
            value_regex: None,
        };
        let extractor = Extractor::with_tables(serial, caliber_table(), EngineConfig::default());
        assert_eq!(extractor.serial_table().errors().len(), 1);

        let doc = Document::from_text("пістолет С/Н 4321").with_entity(0, 1, "WEAPON_FIREARM");
        let serials = extractor.extract_serial_numbers(&doc);
        assert_eq!(serials.len(), 1);
        assert_eq!(serials[0].value, "4321");
    }

    #[test]
    fn test_batch_preserves_order() {
        let docs = vec![
            Document::from_text("пістолет № 1").with_entity(0, 1, "WEAPON_FIREARM"),
            Document::from_text("нічого"),
            Document::from_text("автомат № 3").with_entity(0, 1, "WEAPON_FIREARM"),
        ];
        let results = extractor().analyze_batch(&docs);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].serial_numbers[0].value, "1");
        assert!(results[1].serial_numbers.is_empty());
        assert_eq!(results[2].serial_numbers[0].value, "3");
    }

    #[test]
    fn test_extractor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Extractor>();
    }
}
