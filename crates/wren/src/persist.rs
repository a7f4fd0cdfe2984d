// Persist — weight and batch-norm file format
//
// A weight file is a flat sequence of records, no file header:
//
//   "<node>_<role> <w> <h> <d>\n"      text header line
//   [f32 LE; w * h * d]                raw payload, no trailing newline
//
// Roles:
//   w           weight buffer
//   bn_mean     batch-norm running mean
//   bn_varce    batch-norm running variance
//   bn_scale    batch-norm scale (γ)
//   bn_schift   batch-norm shift (β)
//
// A tensor of shape (w, h, ch, batch) is written with d = ch * batch and is
// read back as (w, h, d, 1).
//
// Node names may themselves contain '_': the known role suffixes are matched
// from the right end of the key. A key without a known suffix is split at
// its last '_' into node name and an unknown role.
//
// A batch-norm block is complete once all four parts for a node have been
// read, in any order; it is installed at that point. Records with an unknown
// role, and blocks still incomplete at the end of the stream, are skipped in
// lenient mode and rejected in strict mode.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use wren_core::error::{Error, Result};
use wren_core::{BatchNorm, Shape4, Tensor};

use crate::config::LoadMode;

/// What a record holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightRole {
    Weight,
    BnMean,
    BnVariance,
    BnScale,
    BnShift,
    /// A role this reader does not know.
    Unknown(String),
}

const KNOWN_ROLES: [(&str, WeightRole); 5] = [
    ("bn_schift", WeightRole::BnShift),
    ("bn_scale", WeightRole::BnScale),
    ("bn_varce", WeightRole::BnVariance),
    ("bn_mean", WeightRole::BnMean),
    ("w", WeightRole::Weight),
];

impl WeightRole {
    pub fn as_str(&self) -> &str {
        match self {
            WeightRole::Weight => "w",
            WeightRole::BnMean => "bn_mean",
            WeightRole::BnVariance => "bn_varce",
            WeightRole::BnScale => "bn_scale",
            WeightRole::BnShift => "bn_schift",
            WeightRole::Unknown(s) => s,
        }
    }
}

impl fmt::Display for WeightRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of a weight file.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRecord {
    pub node: String,
    pub role: WeightRole,
    pub shape: Shape4,
    pub data: Vec<f32>,
}

impl WeightRecord {
    /// The weight record of a node.
    pub fn weight(node: &str, weight: &Tensor) -> Self {
        WeightRecord {
            node: node.to_string(),
            role: WeightRole::Weight,
            shape: weight.shape(),
            data: weight.data().to_vec(),
        }
    }

    /// The four records of a batch-norm block.
    pub fn batch_norm(node: &str, bn: &BatchNorm) -> [Self; 4] {
        let part = |role: WeightRole, data: &[f32]| WeightRecord {
            node: node.to_string(),
            role,
            shape: bn.shape,
            data: data.to_vec(),
        };
        [
            part(WeightRole::BnMean, &bn.mean),
            part(WeightRole::BnVariance, &bn.variance),
            part(WeightRole::BnScale, &bn.scale),
            part(WeightRole::BnShift, &bn.shift),
        ]
    }

    fn key(&self) -> String {
        format!("{}_{}", self.node, self.role)
    }
}

/// Split a header key into node name and role.
fn split_key(key: &str) -> Result<(&str, WeightRole)> {
    for (suffix, role) in KNOWN_ROLES.iter() {
        if let Some(node) = key.strip_suffix(suffix) {
            if let Some(node) = node.strip_suffix('_') {
                if !node.is_empty() {
                    return Ok((node, role.clone()));
                }
            }
        }
    }
    match key.rsplit_once('_') {
        Some((node, role)) if !node.is_empty() && !role.is_empty() => {
            Ok((node, WeightRole::Unknown(role.to_string())))
        }
        _ => Err(Error::format(format!("malformed record key '{key}'"))),
    }
}

// Writing

/// Write records to a stream.
pub fn write_weights(writer: &mut impl Write, records: &[WeightRecord]) -> Result<()> {
    for rec in records {
        if rec.data.len() != rec.shape.elem_count() {
            return Err(Error::format(format!(
                "record '{}' has {} values, shape {} requires {}",
                rec.key(),
                rec.data.len(),
                rec.shape,
                rec.shape.elem_count()
            )));
        }
        let depth = rec.shape.ch * rec.shape.batch;
        writeln!(writer, "{} {} {} {}", rec.key(), rec.shape.w, rec.shape.h, depth)
            .map_err(stream_err)?;
        let bytes: Vec<u8> = rec.data.iter().flat_map(|v| v.to_le_bytes()).collect();
        writer.write_all(&bytes).map_err(stream_err)?;
    }
    Ok(())
}

/// Write records to a file, creating missing parent directories.
pub fn save_records(path: impl AsRef<Path>, records: &[WeightRecord]) -> Result<()> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| Error::io(&shown, e))?;
    }
    let file = File::create(path).map_err(|e| Error::io(&shown, e))?;
    let mut writer = BufWriter::new(file);
    write_weights(&mut writer, records)?;
    writer.flush().map_err(|e| Error::io(&shown, e))?;
    tracing::debug!(path = %shown, records = records.len(), "saved weights");
    Ok(())
}

// Reading

/// Read every record of a stream.
pub fn read_weights(reader: &mut impl BufRead) -> Result<Vec<WeightRecord>> {
    let mut records = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).map_err(stream_err)? == 0 {
            break;
        }
        let header = std::str::from_utf8(&line)
            .map_err(|_| Error::format("record header is not valid UTF-8"))?
            .trim();
        if header.is_empty() {
            continue;
        }

        let fields: Vec<&str> = header.split_whitespace().collect();
        let &[key, w, h, d] = fields.as_slice() else {
            return Err(Error::format(format!("malformed record header '{header}'")));
        };
        let dim = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| Error::format(format!("bad dimension '{s}' in header '{header}'")))
        };
        let (w, h, d) = (dim(w)?, dim(h)?, dim(d)?);
        let (node, role) = split_key(key)?;

        let byte_len = w
            .checked_mul(h)
            .and_then(|n| n.checked_mul(d))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::format(format!("record '{key}' is too large")))?;
        let shape = Shape4::new(w, h, d, 1);

        // Never buffer more than the stream actually holds.
        let mut bytes = Vec::new();
        (&mut *reader)
            .take(byte_len as u64)
            .read_to_end(&mut bytes)
            .map_err(stream_err)?;
        if bytes.len() != byte_len {
            return Err(Error::format(format!("truncated payload for record '{key}'")));
        }
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        records.push(WeightRecord {
            node: node.to_string(),
            role,
            shape,
            data,
        });
    }
    Ok(records)
}

/// Read every record of a file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<WeightRecord>> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    let file = File::open(path).map_err(|e| Error::io(&shown, e))?;
    let records = read_weights(&mut BufReader::new(file))?;
    tracing::debug!(path = %shown, records = records.len(), "read weights");
    Ok(records)
}

fn stream_err(e: std::io::Error) -> Error {
    Error::io("<stream>", e)
}

// Assembly

/// Weights and complete batch-norm blocks, ready to install.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightSet {
    pub weights: Vec<(String, Tensor)>,
    pub batch_norms: Vec<(String, BatchNorm)>,
}

#[derive(Debug, Default)]
struct PendingBn {
    mean: Option<(Shape4, Vec<f32>)>,
    variance: Option<(Shape4, Vec<f32>)>,
    scale: Option<(Shape4, Vec<f32>)>,
    shift: Option<(Shape4, Vec<f32>)>,
}

impl PendingBn {
    fn slot(&mut self, role: &WeightRole) -> Option<&mut Option<(Shape4, Vec<f32>)>> {
        match role {
            WeightRole::BnMean => Some(&mut self.mean),
            WeightRole::BnVariance => Some(&mut self.variance),
            WeightRole::BnScale => Some(&mut self.scale),
            WeightRole::BnShift => Some(&mut self.shift),
            _ => None,
        }
    }

    fn is_complete(&self) -> bool {
        self.mean.is_some() && self.variance.is_some() && self.scale.is_some() && self.shift.is_some()
    }

    fn into_block(self, node: &str) -> Result<BatchNorm> {
        let (Some(mean), Some(variance), Some(scale), Some(shift)) =
            (self.mean, self.variance, self.scale, self.shift)
        else {
            return Err(Error::format(format!("incomplete batch-norm block for node '{node}'")));
        };
        let len = mean.1.len();
        if [&variance, &scale, &shift].iter().any(|p| p.1.len() != len) {
            return Err(Error::format(format!(
                "batch-norm parts of node '{node}' differ in size"
            )));
        }
        Ok(BatchNorm {
            shape: mean.0,
            mean: mean.1,
            variance: variance.1,
            scale: scale.1,
            shift: shift.1,
        })
    }
}

/// Group records into installable weights and batch-norm blocks.
pub fn assemble(records: Vec<WeightRecord>, mode: LoadMode) -> Result<WeightSet> {
    let mut set = WeightSet::default();
    let mut pending: BTreeMap<String, PendingBn> = BTreeMap::new();

    for rec in records {
        match rec.role {
            WeightRole::Weight => {
                let t = Tensor::from_vec(rec.shape, rec.data)?;
                set.weights.push((rec.node, t));
            }
            WeightRole::Unknown(ref role) => match mode {
                LoadMode::Lenient => {
                    tracing::debug!(node = %rec.node, role = %role, "skipping unknown record");
                }
                LoadMode::Strict => {
                    return Err(Error::format(format!(
                        "unknown record role '{role}' for node '{}'",
                        rec.node
                    )));
                }
            },
            ref role => {
                let entry = pending.entry(rec.node.clone()).or_default();
                if let Some(slot) = entry.slot(role) {
                    *slot = Some((rec.shape, rec.data));
                }
                if entry.is_complete() {
                    if let Some(parts) = pending.remove(&rec.node) {
                        let bn = parts.into_block(&rec.node)?;
                        set.batch_norms.push((rec.node, bn));
                    }
                }
            }
        }
    }

    if let Some(node) = pending.keys().next() {
        match mode {
            LoadMode::Strict => {
                return Err(Error::format(format!(
                    "incomplete batch-norm block for node '{node}'"
                )));
            }
            LoadMode::Lenient => {
                tracing::warn!(nodes = pending.len(), "ignoring incomplete batch-norm blocks");
            }
        }
    }
    Ok(set)
}
