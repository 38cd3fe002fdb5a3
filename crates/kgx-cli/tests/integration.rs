//! Integration tests for the kgx CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn kgx_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kgx"))
}

fn kgx(args: &[&str]) -> Output {
    Command::new(kgx_bin())
        .args(args)
        // Keep a user config from leaking into the tests
        .args(["--config", "/nonexistent/kgx/config.toml"])
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run kgx")
}

fn write_graph(dir: &Path) -> (PathBuf, PathBuf) {
    let nodes = dir.join("graph_nodes.tsv");
    let edges = dir.join("graph_edges.tsv");
    fs::write(
        &nodes,
        "id\tcategory\tname\n\
         HGNC:11603\tbiolink:Gene\tTBX4\n\
         HGNC:11604\tbiolink:Gene\tTBX5\n\
         MONDO:0005002\tbiolink:Disease\tCOPD\n\
         CHEBI:15365\tbiolink:ChemicalSubstance\taspirin\n",
    )
    .unwrap();
    fs::write(
        &edges,
        "subject\tpredicate\tobject\trelation\n\
         HGNC:11603\tbiolink:related_to\tMONDO:0005002\tRO:0002410\n\
         CHEBI:15365\tbiolink:interacts_with\tHGNC:11604\tRO:0002436\n",
    )
    .unwrap();
    (nodes, edges)
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn ids(graph: &serde_json::Value, key: &str, field: &str) -> Vec<String> {
    graph[key]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r[field].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_help() {
    let output = kgx(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("transform"));
    assert!(stdout.contains("formats"));
}

#[test]
fn test_formats() {
    let output = kgx(&["formats"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for id in ["tsv", "csv", "json", "jsonl", "nt"] {
        assert!(stdout.contains(&format!("  {id}\n")), "missing {id}");
    }
}

#[test]
fn test_transform_tsv_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let (nodes, edges) = write_graph(dir.path());
    let out = dir.path().join("out.json");

    let output = kgx(&[
        "transform",
        "-i",
        nodes.to_str().unwrap(),
        edges.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Read 4 nodes, 2 edges"));
    assert!(stdout.contains("Wrote 4 nodes, 2 edges"));

    let graph = read_json(&out);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 2);
}

#[test]
fn test_transform_glob_with_node_filter_and_pruning() {
    let dir = tempfile::tempdir().unwrap();
    let (_, edges) = write_graph(dir.path());
    let out = dir.path().join("filtered.json");
    // Nodes must be read first for pruning to see the rejected ones
    let pattern = dir.path().join("graph_n*.tsv");

    let output = kgx(&[
        "transform",
        "-i",
        pattern.to_str().unwrap(),
        edges.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--node-filter",
        "category=biolink:Gene,biolink:Disease",
        "--prune-dangling-edges",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let graph = read_json(&out);
    let node_ids = ids(&graph, "nodes", "id");
    assert_eq!(node_ids.len(), 3);
    assert!(!node_ids.contains(&"CHEBI:15365".to_string()));
    assert_eq!(ids(&graph, "edges", "subject"), ["HGNC:11603"]);
}

#[test]
fn test_transform_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let (nodes, edges) = write_graph(dir.path());
    let config = dir.path().join("kgx.yaml");
    fs::write(
        &config,
        "edge_filters:\n  predicate:\n    - biolink:related_to\n",
    )
    .unwrap();
    let out = dir.path().join("related.jsonl");

    let output = kgx(&[
        "transform",
        "-i",
        nodes.to_str().unwrap(),
        edges.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--transform-config",
        config.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let edge_lines = fs::read_to_string(dir.path().join("related_edges.jsonl")).unwrap();
    assert_eq!(edge_lines.lines().count(), 1);
    assert!(edge_lines.contains("biolink:related_to"));
    let node_lines = fs::read_to_string(dir.path().join("related_nodes.jsonl")).unwrap();
    assert_eq!(node_lines.lines().count(), 4);
}

#[test]
fn test_stream_to_ntriples() {
    let dir = tempfile::tempdir().unwrap();
    let (nodes, edges) = write_graph(dir.path());
    let out = dir.path().join("graph.nt");

    let output = kgx(&[
        "-q",
        "transform",
        "-i",
        nodes.to_str().unwrap(),
        edges.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--stream",
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let nt = fs::read_to_string(&out).unwrap();
    assert!(nt.contains("<https://w3id.org/biolink/vocab/Association>"));
    assert!(nt.contains("<https://w3id.org/biolink/vocab/Gene>"));
}

#[test]
fn test_load_only_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (nodes, edges) = write_graph(dir.path());

    let output = kgx(&[
        "transform",
        "-i",
        nodes.to_str().unwrap(),
        edges.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Graph: 4 nodes, 2 edges"));
    assert!(!stdout.contains("Wrote"));
}

#[test]
fn test_stream_requires_output() {
    let dir = tempfile::tempdir().unwrap();
    let (nodes, _) = write_graph(dir.path());
    let output = kgx(&["transform", "-i", nodes.to_str().unwrap(), "--stream"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--stream requires --output"));
}

#[test]
fn test_unknown_format_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("graph.xyz");
    fs::write(&input, "whatever").unwrap();

    let output = kgx(&["transform", "-i", input.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_unknown_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (nodes, _) = write_graph(dir.path());
    let output = kgx(&[
        "transform",
        "-i",
        nodes.to_str().unwrap(),
        "--profile",
        "no-such-profile",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown profile"));
}

#[test]
fn test_profiles() {
    let output = kgx(&["profiles"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gene-disease"));
    assert!(stdout.contains("prune"));
}

#[test]
fn test_completions() {
    let output = kgx(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("kgx"));
}
