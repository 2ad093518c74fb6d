//! Integration tests for Infragraph
//!
//! These tests run the whole pipeline: state snapshot, selector and
//! parameter resolution, translation, graph construction, reduction and
//! element export, both through the crates and through the CLI binary.

use infragraph_core::{elements, reduce, Config, Element, NodeId};
use infragraph_entities::{catalog, GraphBuilder};
use infragraph_state::{evaluate, resolve, MemoryStateStore, ParamResolver, StateStore};
use serde_json::{json, Value};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const ACCOUNT: &str = "111111111111";

fn function(name: &str) -> Value {
    json!({
        "FunctionName": name,
        "FunctionArn": format!("arn:aws:lambda:us-east-1:{ACCOUNT}:function:{name}"),
        "Runtime": "nodejs20.x"
    })
}

/// Three worker functions, one API function, two buckets and two queues
/// (scanned as dependent calls) in a single account/region.
fn snapshot() -> Value {
    json!([
        {
            "account": ACCOUNT,
            "region": "us-east-1",
            "service": "Lambda",
            "function": "listFunctions",
            "records": [
                {"result": {"Functions": [function("worker-0"), function("worker-1")]}},
                {"result": {"Functions": [function("worker-2"), function("api")]}}
            ]
        },
        {
            "account": ACCOUNT,
            "region": "us-east-1",
            "service": "S3",
            "function": "listBuckets",
            "records": [{"result": {"Buckets": [{"Name": "assets"}, {"Name": "logs"}]}}]
        },
        {
            "account": ACCOUNT,
            "region": "us-east-1",
            "service": "SQS",
            "function": "listQueues",
            "records": [{"result": {"QueueUrls": [
                "https://sqs.us-east-1.amazonaws.com/111111111111/jobs",
                "https://sqs.us-east-1.amazonaws.com/111111111111/jobs-dlq"
            ]}}]
        },
        {
            "account": ACCOUNT,
            "region": "us-east-1",
            "service": "SQS",
            "function": "getQueueAttributes",
            "records": [
                {
                    "parameters": {"QueueUrl": "https://sqs.us-east-1.amazonaws.com/111111111111/jobs"},
                    "result": {"Attributes": {
                        "QueueArn": "arn:aws:sqs:us-east-1:111111111111:jobs",
                        "RedrivePolicy": "{\"deadLetterTargetArn\":\"arn:aws:sqs:us-east-1:111111111111:jobs-dlq\"}"
                    }}
                },
                {
                    "parameters": {"QueueUrl": "https://sqs.us-east-1.amazonaws.com/111111111111/jobs-dlq"},
                    "result": {"Attributes": {"QueueArn": "arn:aws:sqs:us-east-1:111111111111:jobs-dlq"}}
                }
            ]
        }
    ])
}

fn write_snapshot(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("state.json");
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot()).unwrap()).unwrap();
    path
}

const CONFIG: &str = r#"
[[reducer.rules]]
id = "workers"
service = "lambda"
glob = "*:function:worker-*"
"#;

/// Dependent call parameters come from an earlier call's state.
#[tokio::test]
async fn test_parameters_for_dependent_scan() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStateStore::from_snapshot(&write_snapshot(dir.path())).unwrap();

    let resolvers = vec![
        ParamResolver::selector(
            "QueueUrl",
            "SQS|listQueues|[*].result.QueueUrls[]".parse().unwrap(),
        ),
        ParamResolver::value("AttributeNames", json!(["All"])),
    ];
    let params = resolve(ACCOUNT, "us-east-1", &resolvers, &store).await.unwrap();
    assert_eq!(params.len(), 2);
    assert_eq!(params[1]["QueueUrl"], json!("https://sqs.us-east-1.amazonaws.com/111111111111/jobs-dlq"));
    assert_eq!(params[1]["AttributeNames"], json!(["All"]));

    // Paginated records are read in order.
    let names = evaluate(
        ACCOUNT,
        "us-east-1",
        &"Lambda|listFunctions|[*].result.Functions[].FunctionName".parse().unwrap(),
        &store,
    )
    .await
    .unwrap();
    assert_eq!(names, vec![json!("worker-0"), json!("worker-1"), json!("worker-2"), json!("api")]);
}

/// Snapshot to reduced element list, through the crates.
#[tokio::test]
async fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStateStore::from_snapshot(&write_snapshot(dir.path())).unwrap();
    let config = Config::from_toml_str(CONFIG).unwrap();

    let registry = catalog::registry().unwrap();
    let builder = GraphBuilder::new(&registry).with_relationships(catalog::relationships().unwrap());
    let (mut graph, report) = builder.build(&store as &dyn StateStore).await.unwrap();

    // account + 4 functions + 2 buckets + 2 queues
    assert_eq!(report.nodes, 9);
    assert_eq!(report.edges, 1);

    let reduction = reduce(&mut graph, &config.reducer.rules().unwrap()).unwrap();
    assert_eq!(reduction.collapsed(), 3);

    let workers = NodeId::new(format!("{ACCOUNT}-workers"));
    let aggregate = graph.node(&workers).unwrap();
    assert_eq!(aggregate.metadata["count"], json!(3));
    assert_eq!(aggregate.parent, Some(NodeId::new(ACCOUNT)));
    assert!(graph.node(&NodeId::new(format!("arn:aws:lambda:us-east-1:{ACCOUNT}:function:api"))).is_some());
    assert_eq!(graph.node_count(), 7);

    let elements = elements(&graph);
    let node_ids: Vec<&str> = elements
        .iter()
        .filter_map(|e| match e {
            Element::Nodes(node) => Some(node.id.as_str()),
            Element::Edges(_) => None,
        })
        .collect();
    assert_eq!(node_ids.len(), 7);
    assert!(node_ids.contains(&"111111111111-workers"));
    assert!(matches!(elements.last(), Some(Element::Edges(_))));
}

#[test]
fn test_cli_build_writes_elements() {
    let dir = TempDir::new().unwrap();
    let state = write_snapshot(dir.path());
    let config = dir.path().join("infragraph.toml");
    std::fs::write(&config, CONFIG).unwrap();
    let out = dir.path().join("graph.json");

    let status = Command::new(env!("CARGO_BIN_EXE_infragraph"))
        .arg("build")
        .arg("--state")
        .arg(&state)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .status()
        .expect("Failed to run infragraph");
    assert!(status.success());

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["nodeCount"], json!(7));
    assert_eq!(written["edgeCount"], json!(1));
    assert_eq!(written["elements"].as_array().unwrap().len(), 8);
}

#[test]
fn test_cli_query_and_params() {
    let dir = TempDir::new().unwrap();
    let state = write_snapshot(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_infragraph"))
        .args(["query", "--state"])
        .arg(&state)
        .arg("S3|listBuckets|[*].result.Buckets[].Name")
        .output()
        .expect("Failed to run infragraph");
    assert!(output.status.success());
    let names: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(names, json!(["assets", "logs"]));

    let output = Command::new(env!("CARGO_BIN_EXE_infragraph"))
        .args(["params", "--state"])
        .arg(&state)
        .args(["--account", ACCOUNT, "--region", "us-east-1"])
        .args(["-r", "QueueUrl=SQS|listQueues|[*].result.QueueUrls[]"])
        .args(["-r", "MaxResults:=10"])
        .output()
        .expect("Failed to run infragraph");
    assert!(output.status.success());
    let params: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(params.as_array().unwrap().len(), 2);
    assert_eq!(params[0]["MaxResults"], json!(10));
}

#[test]
fn test_cli_rejects_malformed_selector() {
    let dir = TempDir::new().unwrap();
    let state = write_snapshot(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_infragraph"))
        .args(["query", "--state"])
        .arg(&state)
        .arg("S3|listBuckets")
        .output()
        .expect("Failed to run infragraph");
    assert!(!output.status.success());
}
