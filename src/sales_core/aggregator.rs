//! Fact/dimension join and windowed measure aggregation

use super::sqlite_reader::{DateDimensionRow, DimensionRow, FactRow};
use super::window::{PeriodKind, WindowBucket, WindowClassifier};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// A key referenced by a fact row but absent from its dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MissingKey {
    Dimension(i64),
    Date(i64),
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingKey::Dimension(k) => write!(f, "dimension key {}", k),
            MissingKey::Date(k) => write!(f, "date key {}", k),
        }
    }
}

/// Every distinct unresolved key, each listed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeyError {
    pub missing: Vec<MissingKey>,
}

impl fmt::Display for JoinKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.missing.iter().map(|k| k.to_string()).collect();
        write!(f, "Fact rows reference unknown keys: {}", keys.join(", "))
    }
}

impl std::error::Error for JoinKeyError {}

/// One fact after joining, classified against the reference date.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedFact {
    pub dimension_key: i64,
    pub measure_value: f64,
    pub bucket: WindowBucket,
}

/// One row of the to-date view.
#[derive(Debug, Clone, PartialEq)]
pub struct ToDateRow {
    pub dimension: DimensionRow,
    pub ytd: f64,
    pub mtd: f64,
    pub wtd: f64,
}

/// One row of a periodic view.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRow {
    pub dimension: DimensionRow,
    pub period: String,
    pub total: f64,
}

/// Joins facts to their date and dimension rows and sums the measure per
/// window or period.
#[derive(Debug)]
pub struct SalesAggregator {
    dimensions: BTreeMap<i64, DimensionRow>,
    joined: Vec<JoinedFact>,
}

impl SalesAggregator {
    /// Resolve every fact's keys. Fails with all distinct missing keys when
    /// any fact cannot be joined.
    pub fn new(
        classifier: WindowClassifier,
        dates: &[DateDimensionRow],
        dimensions: &[DimensionRow],
        facts: &[FactRow],
    ) -> Result<Self, JoinKeyError> {
        let mut date_index: HashMap<i64, chrono::NaiveDate> = HashMap::with_capacity(dates.len());
        for date in dates {
            if date_index.insert(date.date_key, date.date_value).is_some() {
                log::warn!("Duplicate date key {}, keeping the last row", date.date_key);
            }
        }

        let mut dimension_index = BTreeMap::new();
        for dimension in dimensions {
            if dimension_index.insert(dimension.dimension_key, dimension.clone()).is_some() {
                log::warn!(
                    "Duplicate dimension key {}, keeping the last row",
                    dimension.dimension_key
                );
            }
        }

        let mut missing = BTreeSet::new();
        let mut joined = Vec::with_capacity(facts.len());

        for fact in facts {
            if !dimension_index.contains_key(&fact.dimension_key) {
                missing.insert(MissingKey::Dimension(fact.dimension_key));
            }
            match date_index.get(&fact.date_key) {
                Some(date) => {
                    if dimension_index.contains_key(&fact.dimension_key) {
                        joined.push(JoinedFact {
                            dimension_key: fact.dimension_key,
                            measure_value: fact.measure_value,
                            bucket: classifier.classify(*date),
                        });
                    }
                }
                None => {
                    missing.insert(MissingKey::Date(fact.date_key));
                }
            }
        }

        if !missing.is_empty() {
            for key in &missing {
                log::error!("❌ Unresolved {} in fact table", key);
            }
            return Err(JoinKeyError {
                missing: missing.into_iter().collect(),
            });
        }

        log::debug!(
            "Joined {} facts across {} dimensions (reference {})",
            joined.len(),
            dimension_index.len(),
            classifier.reference()
        );

        Ok(Self {
            dimensions: dimension_index,
            joined,
        })
    }

    /// YTD/MTD/WTD sums per dimension. Every dimension appears, with zero
    /// sums when none of its facts fall in a window.
    pub fn to_date(&self) -> Vec<ToDateRow> {
        let mut sums: BTreeMap<i64, (f64, f64, f64)> =
            self.dimensions.keys().map(|k| (*k, (0.0, 0.0, 0.0))).collect();

        for fact in &self.joined {
            let entry = sums.entry(fact.dimension_key).or_insert((0.0, 0.0, 0.0));
            if fact.bucket.ytd {
                entry.0 += fact.measure_value;
            }
            if fact.bucket.mtd {
                entry.1 += fact.measure_value;
            }
            if fact.bucket.wtd {
                entry.2 += fact.measure_value;
            }
        }

        sums.into_iter()
            .filter_map(|(key, (ytd, mtd, wtd))| {
                self.dimensions.get(&key).map(|dimension| ToDateRow {
                    dimension: dimension.clone(),
                    ytd,
                    mtd,
                    wtd,
                })
            })
            .collect()
    }

    /// Measure summed per dimension and period, ordered by dimension key,
    /// then period label, then dimension code. Only periods with facts
    /// appear.
    pub fn periodic(&self, kind: PeriodKind) -> Vec<PeriodRow> {
        let mut sums: BTreeMap<(i64, String), f64> = BTreeMap::new();

        for fact in &self.joined {
            let label = fact.bucket.period_label(kind).to_string();
            *sums.entry((fact.dimension_key, label)).or_insert(0.0) += fact.measure_value;
        }

        let mut rows: Vec<PeriodRow> = sums
            .into_iter()
            .filter_map(|((key, period), total)| {
                self.dimensions.get(&key).map(|dimension| PeriodRow {
                    dimension: dimension.clone(),
                    period,
                    total,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            a.dimension
                .dimension_key
                .cmp(&b.dimension.dimension_key)
                .then_with(|| a.period.cmp(&b.period))
                .then_with(|| a.dimension.code.cmp(&b.dimension.code))
        });
        rows
    }
}
