//! Transcriptional regulatory network: regulator → target gene relations.

use log::warn;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::data::source::{delimited_reader, parse_cell};
use crate::data::table::cell_text;
use crate::data::LoadFrame;
use crate::error::{ModulonError, Result};

/// Separator for regulators acting together.
pub const GROUP_SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrnEdge {
    pub regulator: String,
    pub gene_id: String,
    pub evidence: Option<String>,
}

impl TrnEdge {
    pub fn new(regulator: impl Into<String>, gene_id: impl Into<String>) -> Self {
        TrnEdge {
            regulator: regulator.into(),
            gene_id: gene_id.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// How the members of a composite regulon are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    /// Genes targeted by any listed regulator
    Or,
    /// Genes targeted by every listed regulator
    And,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegulatoryNetwork {
    edges: Vec<TrnEdge>,
    has_evidence: bool,
}

impl RegulatoryNetwork {
    pub fn new(edges: Vec<TrnEdge>) -> Self {
        let has_evidence = edges.iter().any(|e| e.evidence.is_some());
        RegulatoryNetwork {
            edges,
            has_evidence,
        }
    }

    /// Marks the network as carrying an evidence attribute even when every level is missing.
    pub fn with_evidence_column(mut self) -> Self {
        self.has_evidence = true;
        self
    }

    pub fn edges(&self) -> &[TrnEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn has_evidence(&self) -> bool {
        self.has_evidence
    }

    /// Rejects edges with a missing regulator or gene and rewrites `/` and `+` to `;`.
    pub fn normalized(self) -> Result<Self> {
        let mut edges = Vec::with_capacity(self.edges.len());
        for (row, mut edge) in self.edges.into_iter().enumerate() {
            if edge.regulator.trim().is_empty() {
                return Err(ModulonError::schema(format!(
                    "Null value detected in \"regulator\" column of TRN (row {})",
                    row
                )));
            }
            if edge.gene_id.trim().is_empty() {
                return Err(ModulonError::schema(format!(
                    "Null value detected in \"gene_id\" column of TRN (row {})",
                    row
                )));
            }
            edge.regulator = edge.regulator.replace(['/', '+'], ";");
            edges.push(edge);
        }
        Ok(RegulatoryNetwork {
            edges,
            has_evidence: self.has_evidence,
        })
    }

    /// Keeps edges whose target is in `genes`; returns the sorted set of dropped targets.
    pub fn restrict_to_genes(self, genes: &HashSet<&str>) -> (Self, Vec<String>) {
        let mut dropped = BTreeSet::new();
        let has_evidence = self.has_evidence;
        let edges = self
            .edges
            .into_iter()
            .filter(|e| {
                let keep = genes.contains(e.gene_id.as_str());
                if !keep {
                    dropped.insert(e.gene_id.clone());
                }
                keep
            })
            .collect();
        (
            RegulatoryNetwork {
                edges,
                has_evidence,
            },
            dropped.into_iter().collect(),
        )
    }

    /// Edges whose evidence level is one of `levels`.
    ///
    /// A network without an evidence attribute is passed through unchanged with a warning.
    pub fn filter_evidence(&self, levels: &[String]) -> Cow<'_, RegulatoryNetwork> {
        if !self.has_evidence {
            warn!("TRN does not contain an \"evidence\" column. Ignoring evidence argument.");
            return Cow::Borrowed(self);
        }
        let edges = self
            .edges
            .iter()
            .filter(|e| {
                e.evidence
                    .as_ref()
                    .is_some_and(|ev| levels.iter().any(|l| l == ev))
            })
            .cloned()
            .collect();
        Cow::Owned(RegulatoryNetwork {
            edges,
            has_evidence: true,
        })
    }

    /// Unique regulators in first-seen order.
    pub fn regulators(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .map(|e| e.regulator.as_str())
            .filter(|r| seen.insert(*r))
            .collect()
    }

    pub fn contains_regulator(&self, regulator: &str) -> bool {
        self.edges.iter().any(|e| e.regulator == regulator)
    }

    pub fn targets(&self, regulator: &str) -> HashSet<&str> {
        self.edges
            .iter()
            .filter(|e| e.regulator == regulator)
            .map(|e| e.gene_id.as_str())
            .collect()
    }

    /// Target genes of a regulator expression.
    ///
    /// An exact regulator name is looked up directly. Otherwise `+` joins regulators that must
    /// all target a gene, `/` joins regulators any of which may, and `;` is combined with
    /// `mode`. Returns the genes and the number of regulators in the expression.
    pub fn regulon(&self, expr: &str, mode: CombineMode) -> Result<(HashSet<&str>, usize)> {
        if self.contains_regulator(expr) {
            return Ok((self.targets(expr), 1));
        }
        let (parts, mode) = split_regulon(expr, mode)?;
        let mut sets = parts.iter().map(|p| self.targets(p));
        let first = sets.next().unwrap_or_default();
        let genes = sets.fold(first, |acc, next| match mode {
            CombineMode::Or => acc.union(&next).copied().collect(),
            CombineMode::And => acc.intersection(&next).copied().collect(),
        });
        Ok((genes, parts.len()))
    }

    /// Regulators of each gene, comma-joined in network order.
    pub fn regulators_by_gene(&self) -> HashMap<&str, String> {
        let mut by_gene: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            by_gene
                .entry(edge.gene_id.as_str())
                .or_default()
                .push(edge.regulator.as_str());
        }
        by_gene
            .into_iter()
            .map(|(gene, regs)| (gene, regs.join(",")))
            .collect()
    }
}

/// Splits a composite regulator expression into its parts and combine mode.
pub fn split_regulon(expr: &str, mode: CombineMode) -> Result<(Vec<&str>, CombineMode)> {
    let has_and = expr.contains('+');
    let has_or = expr.contains('/');
    let (separator, mode) = match (has_and, has_or) {
        (true, true) => {
            return Err(ModulonError::precondition(format!(
                "regulon {} mixes '+' and '/'",
                expr
            )));
        }
        (true, false) => ('+', CombineMode::And),
        (false, true) => ('/', CombineMode::Or),
        (false, false) => (GROUP_SEPARATOR, mode),
    };
    let parts: Vec<&str> = expr
        .split(separator)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(ModulonError::precondition("empty regulator expression"));
    }
    Ok((parts, mode))
}

fn json_column<'a>(outer: &'a Map<String, Value>, name: &str) -> Result<Option<&'a Map<String, Value>>> {
    match outer.get(name) {
        None => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(_) => Err(ModulonError::schema(format!(
            "TRN column {} must map row keys to values",
            name
        ))),
    }
}

impl LoadFrame for RegulatoryNetwork {
    fn from_path(path: &Path) -> Result<Self> {
        let mut reader = delimited_reader(path)?;
        let headers = reader.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let regulator_col = find("regulator")
            .ok_or_else(|| ModulonError::schema("TRN must contain a \"regulator\" column"))?;
        let gene_col = find("gene_id")
            .ok_or_else(|| ModulonError::schema("TRN must contain a \"gene_id\" column"))?;
        let evidence_col = find("evidence");

        let mut edges = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |j: usize| record.get(j).unwrap_or("").trim().to_string();
            edges.push(TrnEdge {
                regulator: field(regulator_col),
                gene_id: field(gene_col),
                evidence: evidence_col
                    .map(field)
                    .and_then(|ev| cell_text(&parse_cell(&ev))),
            });
        }
        let trn = RegulatoryNetwork::new(edges);
        Ok(if evidence_col.is_some() {
            trn.with_evidence_column()
        } else {
            trn
        })
    }

    fn from_json_str(document: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(document)?;
        let outer = parsed
            .as_object()
            .ok_or_else(|| ModulonError::schema("TRN JSON must be an object of columns"))?;
        if outer.is_empty() {
            return Ok(RegulatoryNetwork::default());
        }
        let regulators = json_column(outer, "regulator")?
            .ok_or_else(|| ModulonError::schema("TRN must contain a \"regulator\" column"))?;
        let genes = json_column(outer, "gene_id")?
            .ok_or_else(|| ModulonError::schema("TRN must contain a \"gene_id\" column"))?;
        let evidence = json_column(outer, "evidence")?;

        let text = |inner: &Map<String, Value>, key: &str| {
            inner.get(key).and_then(cell_text).unwrap_or_default()
        };
        let edges = regulators
            .keys()
            .map(|key| TrnEdge {
                regulator: text(regulators, key),
                gene_id: text(genes, key),
                evidence: evidence.and_then(|ev| ev.get(key)).and_then(cell_text),
            })
            .collect();
        let trn = RegulatoryNetwork::new(edges);
        Ok(if evidence.is_some() {
            trn.with_evidence_column()
        } else {
            trn
        })
    }

    fn to_json_value(&self) -> Value {
        if self.edges.is_empty() {
            return Value::Object(Map::new());
        }
        let column = |f: &dyn Fn(&TrnEdge) -> Value| -> Value {
            Value::Object(
                self.edges
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (i.to_string(), f(e)))
                    .collect(),
            )
        };
        let mut outer = Map::new();
        outer.insert(
            "regulator".to_string(),
            column(&|e| Value::String(e.regulator.clone())),
        );
        outer.insert(
            "gene_id".to_string(),
            column(&|e| Value::String(e.gene_id.clone())),
        );
        if self.has_evidence {
            outer.insert(
                "evidence".to_string(),
                column(&|e| {
                    e.evidence
                        .as_ref()
                        .map_or(Value::Null, |ev| Value::String(ev.clone()))
                }),
            );
        }
        Value::Object(outer)
    }
}
