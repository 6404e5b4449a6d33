//! Genome records and generation snapshots.
//!
//! A genome is persisted as a [`GenomeRecord`]: plain node and connection
//! records with enum fields stored as integer codes. Decoding validates every
//! code and every connection endpoint, so a successfully decoded genome always
//! upholds the node-index invariant.
//!
//! Snapshots are sets of genomes written under a label (a generation counter
//! or a scenario name). [`SnapshotDir`] keeps one JSON file per label;
//! [`MemorySnapshots`] keeps them in process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::gene::{ConnectionGene, GeneId, NodeGene, NodeKind, Operator};
use crate::genome::{Genome, GenomeError};

/// A persisted genome failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required top-level field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field that must hold a sequence holds something else.
    #[error("field `{0}` is not a sequence")]
    NotASequence(&'static str),
    /// The record could not be parsed into the expected shape.
    #[error("malformed genome record: {0}")]
    Malformed(String),
    #[error("node {node}: kind code {code} is out of range")]
    NodeKind { node: usize, code: i64 },
    #[error("node {node}: aggregation operator code {code} is out of range")]
    Aggregation { node: usize, code: i64 },
    #[error("connection {connection}: weight operator code {code} is out of range")]
    WeightOperator { connection: usize, code: i64 },
    #[error(transparent)]
    Genome(#[from] GenomeError),
}

/// Errors raised while writing or reading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot JSON failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Labels become file names and may not contain path separators.
    #[error("invalid snapshot label {0:?}")]
    InvalidLabel(String),
    #[error("no snapshot named {0:?}")]
    NotFound(String),
}

/// Persisted form of a [`NodeGene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    /// 0 = Input, 1 = Output, 2 = Hidden.
    pub kind: i64,
    pub io_index: usize,
    /// 0 = Sum, 1 = Product.
    pub aggregation_operator: i64,
}

/// Persisted form of a [`ConnectionGene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: String,
    pub source_index: usize,
    pub target_index: usize,
    pub weight: f32,
    /// 0 = Sum, 1 = Product.
    pub weight_operator: i64,
    pub enabled: bool,
}

/// Persisted form of a [`Genome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
}

/// Convert a genome to its record form. Identifiers are copied verbatim.
#[must_use]
pub fn encode(genome: &Genome) -> GenomeRecord {
    GenomeRecord {
        nodes: genome
            .nodes()
            .iter()
            .map(|n| NodeRecord {
                id: n.id.as_str().to_owned(),
                kind: i64::from(n.kind.code()),
                io_index: n.io_index,
                aggregation_operator: i64::from(n.aggregation.code()),
            })
            .collect(),
        connections: genome
            .connections()
            .iter()
            .map(|c| ConnectionRecord {
                id: c.id.as_str().to_owned(),
                source_index: c.source,
                target_index: c.target,
                weight: c.weight,
                weight_operator: i64::from(c.weight_operator.code()),
                enabled: c.enabled,
            })
            .collect(),
    }
}

/// Rebuild a genome from its record form.
///
/// # Errors
///
/// Returns a [`SchemaError`] if any enum code is out of range or a connection
/// refers to a node position that does not exist.
pub fn decode(record: GenomeRecord) -> Result<Genome, SchemaError> {
    let nodes = record
        .nodes
        .into_iter()
        .enumerate()
        .map(|(node, r)| -> Result<NodeGene, SchemaError> {
            let kind = NodeKind::from_code(r.kind).ok_or(SchemaError::NodeKind {
                node,
                code: r.kind,
            })?;
            let aggregation =
                Operator::from_code(r.aggregation_operator).ok_or(SchemaError::Aggregation {
                    node,
                    code: r.aggregation_operator,
                })?;
            Ok(NodeGene {
                id: GeneId::from_string(r.id),
                kind,
                io_index: r.io_index,
                aggregation,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let connections = record
        .connections
        .into_iter()
        .enumerate()
        .map(|(connection, r)| -> Result<ConnectionGene, SchemaError> {
            let weight_operator =
                Operator::from_code(r.weight_operator).ok_or(SchemaError::WeightOperator {
                    connection,
                    code: r.weight_operator,
                })?;
            Ok(ConnectionGene {
                id: GeneId::from_string(r.id),
                source: r.source_index,
                target: r.target_index,
                weight: r.weight,
                weight_operator,
                enabled: r.enabled,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Genome::new(nodes, connections)?)
}

/// Decode a genome from an untyped JSON value.
///
/// # Errors
///
/// Returns [`SchemaError::MissingField`] or [`SchemaError::NotASequence`] when
/// `nodes` or `connections` is absent or not an array, and any error
/// [`decode`] can raise.
pub fn from_value(value: Value) -> Result<Genome, SchemaError> {
    for field in ["nodes", "connections"] {
        match value.get(field) {
            None => return Err(SchemaError::MissingField(field)),
            Some(Value::Array(_)) => {}
            Some(_) => return Err(SchemaError::NotASequence(field)),
        }
    }
    let record: GenomeRecord =
        serde_json::from_value(value).map_err(|e| SchemaError::Malformed(e.to_string()))?;
    decode(record)
}

/// Decode a genome from JSON text.
///
/// # Errors
///
/// See [`from_value`]. Unparseable text is reported as [`SchemaError::Malformed`].
pub fn from_json(json: &str) -> Result<Genome, SchemaError> {
    let value: Value = serde_json::from_str(json).map_err(|e| SchemaError::Malformed(e.to_string()))?;
    from_value(value)
}

/// Encode a genome as pretty-printed JSON.
///
/// # Errors
///
/// Propagates serializer failures.
pub fn to_json(genome: &Genome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&encode(genome))
}

impl Serialize for Genome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Genome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = GenomeRecord::deserialize(deserializer)?;
        decode(record).map_err(serde::de::Error::custom)
    }
}

/// Destination for generation snapshots.
///
/// Writes are synchronous: a reset that snapshots does not return until the
/// write has completed.
pub trait SnapshotSink {
    /// Persist `genomes` under `label`, replacing any previous set with that label.
    ///
    /// # Errors
    ///
    /// Implementation specific; see [`SnapshotError`].
    fn write(&mut self, label: &str, genomes: &[Genome]) -> Result<(), SnapshotError>;
}

/// Snapshot sink storing one JSON file per label in a directory.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    /// Open (and create if needed) a snapshot directory.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, label: &str) -> Result<PathBuf, SnapshotError> {
        if label.is_empty() || label.contains(['/', '\\']) || label == "." || label == ".." {
            return Err(SnapshotError::InvalidLabel(label.to_owned()));
        }
        Ok(self.root.join(format!("{label}.json")))
    }

    /// Read back the genomes written under `label`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] if no such snapshot exists,
    /// [`SnapshotError::Schema`] if the file is not an array of valid genome
    /// records, and I/O or JSON errors otherwise.
    pub fn load(&self, label: &str) -> Result<Vec<Genome>, SnapshotError> {
        let path = self.path_for(label)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(label.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&text)? {
            Value::Array(items) => Ok(items
                .into_iter()
                .map(from_value)
                .collect::<Result<Vec<_>, _>>()?),
            _ => Err(SchemaError::NotASequence("snapshot").into()),
        }
    }

    /// Labels of all snapshots in the directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory cannot be listed.
    pub fn labels(&self) -> Result<Vec<String>, SnapshotError> {
        let mut labels = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    labels.push(stem.to_owned());
                }
            }
        }
        labels.sort();
        Ok(labels)
    }
}

impl SnapshotSink for SnapshotDir {
    fn write(&mut self, label: &str, genomes: &[Genome]) -> Result<(), SnapshotError> {
        let path = self.path_for(label)?;
        let records: Vec<GenomeRecord> = genomes.iter().map(encode).collect();
        fs::write(&path, serde_json::to_string_pretty(&records)?)?;
        log::debug!("wrote {} genomes to {}", genomes.len(), path.display());
        Ok(())
    }
}

/// In-process snapshot sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshots {
    entries: Vec<(String, Vec<Genome>)>,
}

impl MemorySnapshots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&[Genome]> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, g)| g.as_slice())
    }

    /// Labels in write order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotSink for MemorySnapshots {
    fn write(&mut self, label: &str, genomes: &[Genome]) -> Result<(), SnapshotError> {
        let genomes = genomes.to_vec();
        match self.entries.iter_mut().find(|(l, _)| l == label) {
            Some(entry) => entry.1 = genomes,
            None => self.entries.push((label.to_owned(), genomes)),
        }
        Ok(())
    }
}
