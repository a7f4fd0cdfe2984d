// Persistence tests — weight files written by one net and read by another
//
// The round-trip law: saving a trained net and loading the file into a fresh
// net of the same topology reproduces every weight and batch-norm buffer
// bit for bit.

use std::io::Cursor;

use wren::persist::{read_weights, write_weights, WeightRecord, WeightRole};
use wren::prelude::*;

fn shape(w: usize, h: usize, ch: usize, batch: usize) -> Shape4 {
    Shape4::new(w, h, ch, batch)
}

/// BeginNet → fc_1 (2 units) → bn1 → act → fc2 (1 unit) → EndNet
fn mlp() -> Vec<Node> {
    vec![
        Node::new("BeginNet", "Input").with_next("fc_1"),
        Node::new("fc_1", "FullyConnected")
            .with_param("units", "2")
            .with_prev("BeginNet")
            .with_next("bn1"),
        Node::new("bn1", "BatchNorm").with_prev("fc_1").with_next("act"),
        Node::new("act", "Activation")
            .with_param("active", "sigmoid")
            .with_prev("bn1")
            .with_next("fc2"),
        Node::new("fc2", "FullyConnected")
            .with_param("units", "1")
            .with_prev("act")
            .with_next("EndNet"),
        Node::new("EndNet", "Output").with_prev("fc2"),
    ]
}

/// A net whose weights and batch-norm statistics have all been initialized.
fn trained(config: NetConfig) -> Net {
    let net = Net::new(mlp(), config).unwrap();
    let mut out = [0.0f32; 2];
    net.forward(
        true,
        shape(3, 1, 1, 2),
        &[0.1, 0.2, 0.3, -0.4, 0.5, -0.6],
        shape(1, 1, 1, 2),
        &mut out,
    )
    .unwrap();
    net.backward(0.05, shape(1, 1, 1, 2), &[0.3, -0.3]).unwrap();
    net
}

fn bits(v: &[f32]) -> Vec<u32> {
    v.iter().map(|x| x.to_bits()).collect()
}

fn snapshot(net: &Net) -> Vec<(String, Shape4, Vec<u32>)> {
    ["fc_1", "fc2"]
        .iter()
        .map(|name| {
            let mut w = Vec::new();
            let s = net.get_weight_node(name, &mut w).unwrap();
            (name.to_string(), s, bits(&w))
        })
        .collect()
}

// Round trip

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mlp.wts");

    let source = trained(NetConfig::default());
    source.save_weights(&path).unwrap();

    let fresh = Net::new(mlp(), NetConfig::default()).unwrap();
    fresh.load_weights(&path).unwrap();

    assert_eq!(snapshot(&fresh), snapshot(&source));
    let a = source.get_batch_norm_node("bn1").unwrap();
    let b = fresh.get_batch_norm_node("bn1").unwrap();
    assert_eq!(a.shape, b.shape);
    assert_eq!(bits(&a.mean), bits(&b.mean));
    assert_eq!(bits(&a.variance), bits(&b.variance));
    assert_eq!(bits(&a.scale), bits(&b.scale));
    assert_eq!(bits(&a.shift), bits(&b.shift));

    // Same weights, same answers.
    let input = [1.0f32, 0.0, -1.0];
    let (mut x, mut y) = ([0.0f32; 1], [0.0f32; 1]);
    source
        .forward(false, shape(3, 1, 1, 1), &input, shape(1, 1, 1, 1), &mut x)
        .unwrap();
    fresh
        .forward(false, shape(3, 1, 1, 1), &input, shape(1, 1, 1, 1), &mut y)
        .unwrap();
    assert_eq!(x, y);
}

#[test]
fn test_stream_round_trip() {
    let source = trained(NetConfig::default());
    let mut buf = Vec::new();
    source.write_weights(&mut buf).unwrap();

    let fresh = Net::new(mlp(), NetConfig::default()).unwrap();
    fresh.read_weights(&mut Cursor::new(buf)).unwrap();
    assert_eq!(snapshot(&fresh), snapshot(&source));
}

#[test]
fn test_record_layout() {
    let source = trained(NetConfig::default());
    let mut buf = Vec::new();
    source.write_weights(&mut buf).unwrap();

    let records = read_weights(&mut Cursor::new(buf)).unwrap();
    let keys: Vec<(String, WeightRole)> = records
        .iter()
        .map(|r| (r.node.clone(), r.role.clone()))
        .collect();
    // Declaration order; nodes without weights or blocks write nothing.
    assert_eq!(
        keys,
        vec![
            ("fc_1".to_string(), WeightRole::Weight),
            ("bn1".to_string(), WeightRole::BnMean),
            ("bn1".to_string(), WeightRole::BnVariance),
            ("bn1".to_string(), WeightRole::BnScale),
            ("bn1".to_string(), WeightRole::BnShift),
            ("fc2".to_string(), WeightRole::Weight),
        ]
    );
    assert_eq!(records[0].shape, shape(4, 2, 1, 1));
    assert_eq!(records[1].shape, shape(2, 1, 1, 1));
}

#[test]
fn test_batched_weight_reloads_with_folded_depth() {
    let source = Net::new(mlp(), NetConfig::default()).unwrap();
    let data = [1.0f32, 2.0, 3.0, 4.0];
    source.set_weight_node("fc2", shape(2, 1, 1, 2), &data).unwrap();
    let mut buf = Vec::new();
    source.write_weights(&mut buf).unwrap();

    let fresh = Net::new(mlp(), NetConfig::default()).unwrap();
    fresh.read_weights(&mut Cursor::new(buf)).unwrap();
    let mut w = Vec::new();
    assert_eq!(fresh.get_weight_node("fc2", &mut w).unwrap(), shape(2, 1, 2, 1));
    assert_eq!(w, data);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("w.bin");
    trained(NetConfig::default()).save_weights(&path).unwrap();
    assert!(path.exists());
}

// Failures

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let net = Net::new(mlp(), NetConfig::default()).unwrap();
    let err = net.load_weights(dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(net.last_error().contains("absent.bin"));
}

#[test]
fn test_unknown_node_fails_without_partial_load() {
    let net = Net::new(mlp(), NetConfig::default()).unwrap();
    net.set_weight_node("fc2", shape(3, 1, 1, 1), &[1.0, 2.0, 3.0])
        .unwrap();

    let good = Tensor::from_vec(shape(3, 1, 1, 1), vec![9.0, 9.0, 9.0]).unwrap();
    let stray = Tensor::from_vec(shape(1, 1, 1, 1), vec![1.0]).unwrap();
    let mut buf = Vec::new();
    write_weights(
        &mut buf,
        &[
            WeightRecord::weight("fc2", &good),
            WeightRecord::weight("ghost", &stray),
        ],
    )
    .unwrap();

    let err = net.read_weights(&mut Cursor::new(buf)).unwrap_err();
    assert!(matches!(err, Error::NodeNotFound(ref n) if n == "ghost"));

    let mut w = Vec::new();
    net.get_weight_node("fc2", &mut w).unwrap();
    assert_eq!(w, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_unknown_role_lenient_vs_strict() {
    let t = Tensor::from_vec(shape(2, 1, 1, 1), vec![4.0, 5.0]).unwrap();
    let odd = WeightRecord {
        node: "fc2".into(),
        role: WeightRole::Unknown("momentum".into()),
        shape: shape(1, 1, 1, 1),
        data: vec![0.5],
    };
    let mut buf = Vec::new();
    write_weights(&mut buf, &[odd, WeightRecord::weight("fc2", &t)]).unwrap();

    let lenient = Net::new(mlp(), NetConfig::default()).unwrap();
    lenient.read_weights(&mut Cursor::new(buf.clone())).unwrap();
    let mut w = Vec::new();
    lenient.get_weight_node("fc2", &mut w).unwrap();
    assert_eq!(w, vec![4.0, 5.0]);

    let strict = Net::new(
        mlp(),
        NetConfig::default().with_load_mode(LoadMode::Strict),
    )
    .unwrap();
    let err = strict.read_weights(&mut Cursor::new(buf)).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
    let mut w = Vec::new();
    strict.get_weight_node("fc2", &mut w).unwrap();
    assert!(w.is_empty());
}

#[test]
fn test_batch_norm_on_operator_without_block_is_rolled_back() {
    let net = Net::new(mlp(), NetConfig::default()).unwrap();
    let block = BatchNorm::new(shape(2, 1, 1, 1));
    let mut records = WeightRecord::batch_norm("bn1", &block).to_vec();
    records.extend(WeightRecord::batch_norm("fc2", &block));
    let mut buf = Vec::new();
    write_weights(&mut buf, &records).unwrap();

    assert!(net.read_weights(&mut Cursor::new(buf)).is_err());
    assert!(net.get_batch_norm_node("bn1").unwrap().is_empty());
}

#[test]
fn test_truncated_file() {
    let source = trained(NetConfig::default());
    let mut buf = Vec::new();
    source.write_weights(&mut buf).unwrap();
    buf.truncate(buf.len() - 2);

    let fresh = Net::new(mlp(), NetConfig::default()).unwrap();
    let err = fresh.read_weights(&mut Cursor::new(buf)).unwrap_err();
    assert!(err.to_string().contains("truncated payload"));
}
