//! End-to-end pipelines driven through the public API.

use std::fs;
use std::sync::Arc;

use chrono::Utc;
use morphline::{
    compile, compile_file, fields, BuildScope, Collector, Command, CommandBuilder, CompileError, CompileResult,
    Compiler, ConfigNode, Downstream, FaultPolicy, MetricsRegistry, MorphlineContext, Notification, Record,
    Registry, RuntimeResult, Value, Variables,
};
use serde_json::{json, Value as JsonValue};

fn context_with(metrics: &Arc<MetricsRegistry>) -> Arc<MorphlineContext> {
    Arc::new(MorphlineContext::new().with_metrics(Arc::clone(metrics)))
}

fn pipeline(commands: JsonValue) -> (morphline::Morphline, Collector) {
    let collector = Collector::new();
    let morphline = compile(
        &json!({ "commands": commands }),
        None,
        Box::new(collector.clone()),
        Arc::new(MorphlineContext::new()),
    )
    .unwrap();
    (morphline, collector)
}

fn nadja() -> Record {
    let mut record = Record::new();
    record.put("first_name", "Nadja");
    record.put("age", 8);
    record
}

fn texts(values: &[Value]) -> Vec<String> {
    values.iter().map(Value::to_text).collect()
}

// =============================================================================
// Records
// =============================================================================

#[test]
fn test_copy_is_equal_and_independent() {
    let original = nadja();
    let mut copy = original.copy();
    assert_eq!(copy, original);

    copy.put("first_name", "Other");
    copy.remove_all("age");
    assert_ne!(copy, original);
    assert_eq!(texts(original.get("first_name")), vec!["Nadja"]);
    assert_eq!(original.get("age"), &[Value::Int(8)]);
}

#[test]
fn test_values_keep_insertion_order() {
    let mut record = Record::new();
    record.put("tags", "v1");
    record.put("tags", "v2");
    record.put("tags", "v1");
    assert_eq!(texts(record.get("tags")), vec!["v1", "v2", "v1"]);
}

// =============================================================================
// Flow
// =============================================================================

#[test]
fn test_empty_pipeline_is_identity() {
    let (mut m, collector) = pipeline(json!([]));
    assert!(m.process(nadja()).unwrap());
    assert_eq!(collector.records(), vec![nadja()]);
}

#[test]
fn test_conditions_never_mutate_branch_input() {
    let (mut m, collector) = pipeline(json!([{"if": {
        "conditions": [
            {"setValues": {"first_name": "mutated"}},
            {"equals": {"first_name": "mutated"}}
        ],
        "then": [{"addValues": {"branch": "then"}}],
        "else": [{"addValues": {"branch": "else"}}]
    }}]));
    assert!(m.process(nadja()).unwrap());

    let out = collector.first_record().unwrap();
    assert_eq!(texts(out.get("first_name")), vec!["Nadja"]);
    assert_eq!(texts(out.get("branch")), vec!["then"]);
}

#[test]
fn test_try_rules_stops_at_first_success() {
    let metrics = Arc::new(MetricsRegistry::new());
    let collector = Collector::new();
    let doc = json!({"commands": [{"tryRules": {"rules": [
        {"commands": [{"equals": {"first_name": "Nobody"}}]},
        {"commands": [{"addValues": {"rule": "r2"}}]},
        {"commands": [{"setValues": {"rule": "r3"}}]}
    ]}}]});
    let mut m = compile(&doc, None, Box::new(collector.clone()), context_with(&metrics)).unwrap();

    assert!(m.process(nadja()).unwrap());
    assert_eq!(collector.len(), 1);
    assert_eq!(texts(collector.first_record().unwrap().get("rule")), vec!["r2"]);
    assert_eq!(metrics.counter_value("equals.numRecords"), 1);
    assert_eq!(metrics.counter_value("setValues.numRecords"), 0);
}

#[test]
fn test_try_rules_exhaustion_is_a_fault() {
    let (mut m, collector) = pipeline(json!([{"tryRules": {"rules": [
        {"commands": [{"equals": {"first_name": "Nobody"}}]},
        {"commands": [{"decodeBase64": {"field": "first_name"}}]}
    ]}}]));

    let err = m.process(nadja()).unwrap_err();
    assert_eq!(err.command, "tryRules");
    assert!(err.message.contains("found no successful rule"));
    assert!(collector.is_empty());
}

#[test]
fn test_not_inverts_and_never_forwards() {
    let (mut m, collector) = pipeline(json!([{"not": {"commands": [{"equals": {"first_name": "Nadja"}}]}}]));
    assert!(!m.process(nadja()).unwrap());

    let (mut m2, collector2) = pipeline(json!([{"not": {"commands": [{"equals": {"first_name": "Other"}}]}}]));
    assert!(m2.process(nadja()).unwrap());

    assert!(collector.is_empty());
    assert!(collector2.is_empty());
}

#[test]
fn test_for_each_emits_one_record_per_value() {
    let (mut m, collector) = pipeline(json!([{"forEach": {
        "field": "foo",
        "as": "item",
        "commands": [{"addValues": {"out": "processed"}}]
    }}]));

    let mut record = Record::new();
    record.put("foo", "x");
    record.put("foo", "y");
    assert!(m.process(record).unwrap());

    let out = collector.records();
    assert_eq!(out.len(), 2);
    assert_eq!(texts(out[0].get("item")), vec!["x"]);
    assert_eq!(texts(out[1].get("item")), vec!["y"]);
    assert!(out.iter().all(|r| texts(r.get("out")) == vec!["processed"]));
}

// =============================================================================
// Leaf command scenarios
// =============================================================================

#[test]
fn test_add_current_time_preserves_existing_value() {
    let (mut m, collector) = pipeline(json!([{"addCurrentTime": {"field": "ts", "preserveExisting": true}}]));

    let mut existing = Record::new();
    existing.put("ts", 1000);
    m.process(existing).unwrap();
    assert_eq!(collector.first_record().unwrap().get("ts"), &[Value::Int(1000)]);

    collector.reset();
    let before = Utc::now().timestamp_millis();
    m.process(Record::new()).unwrap();
    let after = Utc::now().timestamp_millis();
    let ts = collector.first_record().unwrap().get("ts")[0].as_i64().unwrap();
    assert!(before <= ts && ts <= after);
}

#[test]
fn test_translate_with_fallback() {
    let (mut m, collector) = pipeline(json!([{"translate": {
        "field": "level",
        "dictionary": {"0": "Emergency", "1": "Alert"},
        "fallback": "unknown"
    }}]));

    for input in [Value::Int(999), Value::Int(0), Value::from("0")] {
        let mut record = Record::new();
        record.put("level", input);
        assert!(m.process(record).unwrap());
    }
    let levels: Vec<String> = collector.records().iter().flat_map(|r| texts(r.get("level"))).collect();
    assert_eq!(levels, vec!["unknown", "Emergency", "Emergency"]);
}

#[test]
fn test_syslog_lines_through_grok() {
    let (mut m, collector) = pipeline(json!([
        {"readLine": {"commentPrefix": "#"}},
        {"grok": {"expressions": {
            "message": "<%{POSINT:syslog_pri}>%{SYSLOGTIMESTAMP:syslog_timestamp} %{SYSLOGHOST:syslog_hostname} %{DATA:syslog_program}(?:\\[%{POSINT:syslog_pid}\\])?: %{GREEDYDATA:syslog_message}"
        }}}
    ]));

    let mut record = Record::new();
    record.put(
        fields::ATTACHMENT_BODY,
        b"# header\n<164>Feb  4 10:46:14 syslog sshd[607]: Server listening on 0.0.0.0 port 22.\n".to_vec(),
    );
    assert!(m.process(record).unwrap());

    let out = collector.first_record().unwrap();
    assert_eq!(texts(out.get("syslog_program")), vec!["sshd"]);
    assert_eq!(texts(out.get("syslog_pid")), vec!["607"]);
    assert!(!out.contains_key(fields::ATTACHMENT_BODY));
}

#[test]
fn test_csv_attachments_are_separated_and_parsed() {
    let (mut m, collector) = pipeline(json!([
        {"separateAttachments": {}},
        {"readCSV": {"columns": ["name", "level"], "ignoreFirstLine": true}},
        {"translate": {"field": "level", "dictionary": {"0": "Emergency", "1": "Alert"}, "fallback": "unknown"}}
    ]));

    let mut record = Record::new();
    record.put(fields::ATTACHMENT_BODY, b"name,level\nfoo,0\nbar,7\n".to_vec());
    record.put(fields::ATTACHMENT_BODY, b"name,level\nbaz,1\n".to_vec());
    record.put("source", "upload");
    assert!(m.process(record).unwrap());

    let out = collector.records();
    assert_eq!(out.len(), 3);
    let rows: Vec<(String, String)> = out
        .iter()
        .map(|r| (r.get("name")[0].to_text(), r.get("level")[0].to_text()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("foo".to_string(), "Emergency".to_string()),
            ("bar".to_string(), "unknown".to_string()),
            ("baz".to_string(), "Alert".to_string()),
        ]
    );
    assert!(out.iter().all(|r| texts(r.get("source")) == vec!["upload"]));
}

// =============================================================================
// Configuration files
// =============================================================================

#[test]
fn test_variables_are_substituted_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    fs::write(
        &path,
        r#"{"morphlines": [{"id": "main", "commands": [{"equals": {"first_name": "${MY_VARIABLE}"}}]}]}"#,
    )
    .unwrap();

    let collector = Collector::new();
    let variables = Variables::empty().with("MY_VARIABLE", "Nadja");
    let mut m = compile_file(
        &path,
        Some("main"),
        &variables,
        Box::new(collector.clone()),
        Arc::new(MorphlineContext::new()),
    )
    .unwrap();
    assert!(m.process(nadja()).unwrap());
    assert_eq!(collector.len(), 1);
}

#[test]
fn test_toml_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    fs::write(
        &path,
        r#"
id = "kv"

[[commands]]
[commands.splitKeyValue]
inputField = "pair"
outputFieldPrefix = "kv_"
"#,
    )
    .unwrap();

    let collector = Collector::new();
    let mut m = compile_file(
        &path,
        None,
        &Variables::empty(),
        Box::new(collector.clone()),
        Arc::new(MorphlineContext::new()),
    )
    .unwrap();
    assert_eq!(m.id(), "kv");

    let mut record = Record::new();
    record.put("pair", "color=blue");
    m.process(record).unwrap();
    assert_eq!(texts(collector.first_record().unwrap().get("kv_color")), vec!["blue"]);
}

#[test]
fn test_compile_errors_fail_fast() {
    let err = compile(
        &json!({"commands": [{"noSuchCommand": {}}]}),
        None,
        Box::new(Collector::new()),
        Arc::new(MorphlineContext::new()),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnknownCommand { ref name, .. } if name == "noSuchCommand"));

    let err = compile(
        &json!({"commands": [{"split": {"inputField": "a", "outputField": "b", "separator": ",", "sepparator": ";"}}]}),
        None,
        Box::new(Collector::new()),
        Arc::new(MorphlineContext::new()),
    )
    .unwrap_err();
    assert!(err.to_string().contains("sepparator"));
}

// =============================================================================
// Host integration
// =============================================================================

#[test]
fn test_notifications_reach_the_sink() {
    let (mut m, collector) = pipeline(json!([{"tryRules": {"rules": [{"commands": [{"logDebug": {"format": "x"}}]}]}}]));
    m.start_session().unwrap();
    m.commit().unwrap();
    m.shutdown().unwrap();
    assert_eq!(collector.num_start_events(), 1);
    assert_eq!(collector.notification_count(Notification::CommitTransaction), 1);
    assert_eq!(collector.notification_count(Notification::Shutdown), 1);
}

#[test]
fn test_log_and_reject_policy() {
    let metrics = Arc::new(MetricsRegistry::new());
    let collector = Collector::new();
    let context = MorphlineContext::new()
        .with_metrics(Arc::clone(&metrics))
        .with_fault_policy(FaultPolicy::LogAndReject);
    let mut m = compile(
        &json!({"commands": [{"decodeBase64": {"field": "first_name"}}]}),
        None,
        Box::new(collector.clone()),
        Arc::new(context),
    )
    .unwrap();

    assert!(!m.process(nadja()).unwrap());
    assert!(collector.is_empty());
    assert_eq!(metrics.counter_value("morphline.numRecords"), 1);
    assert_eq!(metrics.counter_value("morphline.numFailures"), 1);
}

/// Uppercases one field.
struct Shout {
    field: String,
}

impl Command for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        let loud: Vec<Value> = record.get(&self.field).iter().map(|v| Value::from(v.to_text().to_uppercase())).collect();
        record.set_values(&self.field, loud);
        child.forward(record)
    }
}

struct ShoutBuilder;

impl CommandBuilder for ShoutBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["shout"]
    }

    fn build(&self, config: &ConfigNode, _scope: &BuildScope, _compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field"])?;
        Ok(Box::new(Shout {
            field: config.get_string("field")?,
        }))
    }
}

#[test]
fn test_custom_builder_registration() {
    let registry = Arc::new(Registry::with_builtins());
    registry.register("acme::commands", ShoutBuilder);

    let collector = Collector::new();
    let doc = json!({
        "importCommands": ["acme.**", "morphline.stdlib.fields"],
        "commands": [{"shout": {"field": "first_name"}}, {"addValues": {"done": true}}]
    });
    let context = Arc::new(MorphlineContext::new().with_registry(Arc::clone(&registry)));
    let mut m = compile(&doc, None, Box::new(collector.clone()), context).unwrap();

    assert!(m.process(nadja()).unwrap());
    let out = collector.first_record().unwrap();
    assert_eq!(texts(out.get("first_name")), vec!["NADJA"]);
    assert_eq!(out.get("done"), &[Value::Bool(true)]);

    // the global registry is untouched
    assert!(!Registry::global().list(&["**".to_string()]).contains_key("shout"));
}
