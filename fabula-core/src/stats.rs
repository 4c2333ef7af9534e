//! # Estatísticas de Processamento
//!
//! Contadores persistidos em JSON: total de fabulas processadas, entidades de
//! arma encontradas (por rótulo) e tempo de processamento, mais um bloco
//! "diário" zerado quando a data do relógio passa da última data registrada.
//!
//! O arquivo é regravado a cada atualização. Tudo acontece sob um único
//! `Mutex`, então a verificação de virada do dia, o incremento e a gravação
//! formam uma seção crítica só.
//!
//! ## Formato do arquivo
//!
//! ```json
//! {
//!     "total_fabulas_processed": 3,
//!     "total_entities_found": 4,
//!     "entities_by_label": {"WEAPON_FIREARM": 4},
//!     "total_processing_time_seconds": 0.12,
//!     "average_processing_time_per_fabula_ms": 40.0,
//!     "last_update_timestamp": "2024-05-01T10:00:00.000000Z",
//!     "daily_stats": {"date": "2024-05-01", "processed_fabulas": 3, ...},
//!     "daily_stats_date": "2024-05-01"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::StatsError;

/// Só rótulos com este prefixo contam como entidades de arma.
pub const WEAPON_LABEL_PREFIX: &str = "WEAPON";

/// Contadores de um período, como expostos pela API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodStats {
    pub processed_fabulas: u64,
    pub found_weapon_entities: u64,
    pub entities_by_label: BTreeMap<String, u64>,
    pub total_processing_time_seconds: f64,
    pub average_processing_time_per_fabula_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub period: PeriodStats,
}

/// Retrato das estatísticas (`GET /stat`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_stats: PeriodStats,
    pub daily_stats: DailyStats,
}

/// Bloco diário como gravado em disco; a data fica como texto para tolerar valores inválidos.
#[derive(Debug, Clone, Default, Serialize)]
struct PersistedDaily {
    date: Option<String>,
    #[serde(flatten)]
    period: PeriodStats,
}

#[derive(Debug, Clone, Default, Serialize)]
struct PersistedStats {
    total_fabulas_processed: u64,
    total_entities_found: u64,
    entities_by_label: BTreeMap<String, u64>,
    total_processing_time_seconds: f64,
    average_processing_time_per_fabula_ms: f64,
    last_update_timestamp: Option<String>,
    daily_stats: PersistedDaily,
    daily_stats_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Counters {
    processed: u64,
    entities: u64,
    by_label: BTreeMap<String, u64>,
    seconds: f64,
}

impl Counters {
    fn from_period(period: PeriodStats) -> Self {
        Self {
            processed: period.processed_fabulas,
            entities: period.found_weapon_entities,
            by_label: period.entities_by_label,
            seconds: period.total_processing_time_seconds,
        }
    }

    fn add(&mut self, weapon_labels: &BTreeMap<String, u64>, seconds: f64) {
        self.processed += 1;
        self.seconds += seconds;
        for (label, count) in weapon_labels {
            self.entities += count;
            *self.by_label.entry(label.clone()).or_insert(0) += count;
        }
    }

    fn to_period(&self) -> PeriodStats {
        let average_ms = if self.processed > 0 { self.seconds / self.processed as f64 * 1000.0 } else { 0.0 };
        PeriodStats {
            processed_fabulas: self.processed,
            found_weapon_entities: self.entities,
            entities_by_label: self.by_label.clone(),
            total_processing_time_seconds: round2(self.seconds),
            average_processing_time_per_fabula_ms: round2(average_ms),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
struct StatsState {
    total: Counters,
    daily: Counters,
    date: NaiveDate,
}

impl StatsState {
    /// Zera o bloco diário se `today` for posterior à data registrada.
    fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today <= self.date {
            return false;
        }
        info!(%today, "novo dia: estatísticas diárias zeradas");
        self.daily = Counters::default();
        self.date = today;
        true
    }

    fn to_persisted(&self) -> PersistedStats {
        let total = self.total.to_period();
        let date = self.date.to_string();
        PersistedStats {
            total_fabulas_processed: total.processed_fabulas,
            total_entities_found: total.found_weapon_entities,
            entities_by_label: total.entities_by_label,
            total_processing_time_seconds: total.total_processing_time_seconds,
            average_processing_time_per_fabula_ms: total.average_processing_time_per_fabula_ms,
            last_update_timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            daily_stats: PersistedDaily { date: Some(date.clone()), period: self.daily.to_period() },
            daily_stats_date: Some(date),
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_stats: self.total.to_period(),
            daily_stats: DailyStats { date: self.date, period: self.daily.to_period() },
        }
    }
}

/// Fonte da data corrente.
pub type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Gerenciador de estatísticas persistidas. Compartilhável entre threads.
pub struct StatsManager {
    path: PathBuf,
    state: Mutex<StatsState>,
    clock: Clock,
}

impl std::fmt::Debug for StatsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsManager").field("path", &self.path).finish_non_exhaustive()
    }
}

impl StatsManager {
    /// Carrega as estatísticas de `path` usando a data local como relógio.
    ///
    /// Arquivo ausente ou corrompido começa do zero; falha apenas se o
    /// diretório do arquivo não puder ser criado.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        Self::open_with_clock(path, Box::new(|| Local::now().date_naive()))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Clock) -> Result<Self, StatsError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StatsError::Io { path: parent.to_path_buf(), source })?;
        }

        let state = load_state(&path, clock());
        info!(path = %path.display(), processed = state.total.processed, "estatísticas carregadas");
        Ok(Self { path, state: Mutex::new(state), clock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registra uma fabula processada: rótulos das entidades encontradas e duração.
    ///
    /// O arquivo é regravado ao final; o erro de gravação é devolvido, mas os
    /// contadores em memória já estão atualizados.
    pub fn record<I, S>(&self, labels: I, duration: Duration) -> Result<(), StatsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut weapon_labels: BTreeMap<String, u64> = BTreeMap::new();
        for label in labels {
            let label = label.as_ref();
            if label.starts_with(WEAPON_LABEL_PREFIX) {
                *weapon_labels.entry(label.to_string()).or_insert(0) += 1;
            }
        }

        let mut state = self.state.lock().map_err(|_| StatsError::Poisoned)?;
        state.roll_over((self.clock)());
        let seconds = duration.as_secs_f64();
        state.total.add(&weapon_labels, seconds);
        state.daily.add(&weapon_labels, seconds);
        self.write(&state)
    }

    /// Retrato atual, após a verificação de virada do dia.
    pub fn snapshot(&self) -> Result<StatsSnapshot, StatsError> {
        let mut state = self.state.lock().map_err(|_| StatsError::Poisoned)?;
        if state.roll_over((self.clock)()) {
            if let Err(e) = self.write(&state) {
                warn!("falha ao gravar estatísticas após virada do dia: {}", e);
            }
        }
        Ok(state.snapshot())
    }

    /// Grava o estado atual (usado no desligamento).
    pub fn save(&self) -> Result<(), StatsError> {
        let state = self.state.lock().map_err(|_| StatsError::Poisoned)?;
        self.write(&state)
    }

    fn write(&self, state: &StatsState) -> Result<(), StatsError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        state.to_persisted().serialize(&mut serializer)?;
        std::fs::write(&self.path, buf).map_err(|source| StatsError::Io { path: self.path.clone(), source })
    }
}

fn load_state(path: &Path, today: NaiveDate) -> StatsState {
    let persisted = match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(root)) => PersistedStats::from_json(&root),
            Ok(_) => {
                warn!(path = %path.display(), "estatísticas não são um objeto JSON, começando do zero");
                PersistedStats::default()
            }
            Err(e) => {
                warn!(path = %path.display(), "estatísticas corrompidas, começando do zero: {}", e);
                PersistedStats::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "arquivo de estatísticas inexistente, começando do zero");
            PersistedStats::default()
        }
        Err(e) => {
            warn!(path = %path.display(), "falha ao ler estatísticas, começando do zero: {}", e);
            PersistedStats::default()
        }
    };

    let stored_date = match persisted.daily_stats_date.as_deref() {
        None => today,
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|_| {
            warn!(date = raw, "data inválida no arquivo de estatísticas, usando hoje");
            today
        }),
    };

    let total = Counters {
        processed: persisted.total_fabulas_processed,
        entities: persisted.total_entities_found,
        by_label: persisted.entities_by_label,
        seconds: persisted.total_processing_time_seconds,
    };
    let mut state = StatsState { total, daily: Counters::from_period(persisted.daily_stats.period), date: stored_date };
    state.roll_over(today);
    state
}

// --- Leitura tolerante, chave a chave -----------------------------------------

impl PersistedStats {
    /// Lê cada chave isoladamente: ausente ou com tipo errado vale o padrão.
    fn from_json(root: &Map<String, Value>) -> Self {
        let daily = match root.get("daily_stats") {
            Some(Value::Object(daily)) => PersistedDaily { date: read_string(daily, "date"), period: read_period(daily) },
            other => {
                warn_wrong_type("daily_stats", other);
                PersistedDaily::default()
            }
        };
        Self {
            total_fabulas_processed: read_u64(root, "total_fabulas_processed"),
            total_entities_found: read_u64(root, "total_entities_found"),
            entities_by_label: read_labels(root, "entities_by_label"),
            total_processing_time_seconds: read_f64(root, "total_processing_time_seconds"),
            average_processing_time_per_fabula_ms: read_f64(root, "average_processing_time_per_fabula_ms"),
            last_update_timestamp: read_string(root, "last_update_timestamp"),
            daily_stats: daily,
            daily_stats_date: read_string(root, "daily_stats_date"),
        }
    }
}

fn read_period(obj: &Map<String, Value>) -> PeriodStats {
    PeriodStats {
        processed_fabulas: read_u64(obj, "processed_fabulas"),
        found_weapon_entities: read_u64(obj, "found_weapon_entities"),
        entities_by_label: read_labels(obj, "entities_by_label"),
        total_processing_time_seconds: read_f64(obj, "total_processing_time_seconds"),
        average_processing_time_per_fabula_ms: read_f64(obj, "average_processing_time_per_fabula_ms"),
    }
}

fn warn_wrong_type(key: &str, value: Option<&Value>) {
    if let Some(value) = value {
        warn!(key, %value, "chave de estatísticas com tipo inválido, usando o padrão");
    }
}

fn read_u64(obj: &Map<String, Value>, key: &str) -> u64 {
    let value = obj.get(key);
    value.and_then(Value::as_u64).unwrap_or_else(|| {
        warn_wrong_type(key, value);
        0
    })
}

fn read_f64(obj: &Map<String, Value>, key: &str) -> f64 {
    let value = obj.get(key);
    value.and_then(Value::as_f64).unwrap_or_else(|| {
        warn_wrong_type(key, value);
        0.0
    })
}

fn read_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let value = obj.get(key);
    let text = value.and_then(Value::as_str).map(str::to_string);
    if text.is_none() {
        warn_wrong_type(key, value);
    }
    text
}

/// Mapa rótulo → contagem; entradas com contagem inválida são ignoradas.
fn read_labels(obj: &Map<String, Value>, key: &str) -> BTreeMap<String, u64> {
    match obj.get(key) {
        Some(Value::Object(labels)) => {
            labels.iter().filter_map(|(label, count)| Some((label.clone(), count.as_u64()?))).collect()
        }
        other => {
            warn_wrong_type(key, other);
            BTreeMap::new()
        }
    }
}
