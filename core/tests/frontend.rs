use stagehand_core::Source;
use stagehand_core::analyzers::analyze_document_rules;
use stagehand_core::ast::{AstNodeKind, WdlType, parse_document_text, writer};
use stagehand_core::eval::{EvalError, evaluate, evaluate_const};
use stagehand_core::ir::value::Value;
use stagehand_core::scan::extract_task_sources;

const SAMPLE: &str = r#"version draft-2

task Count {
    File data
    Int min_length = 1
    String? tag
    command <<<
        wc -l data.txt
    >>>
    runtime {
        memory: "1 GiB"
        docker: "ubuntu:20.04"
    }
    output {
        Int lines = 0
    }
}

workflow tally {
  Array[File] files
  scatter (f in files) {
    call Count { input: data = f }
  }
  output {
    Array[Int] all_lines = Count.lines
  }
}
"#;

#[test]
fn document_parses_with_expected_shape() {
    let doc = parse_document_text("sample.wdl", SAMPLE).expect("parse failed");
    let AstNodeKind::Document { version, items } = &doc.kind else {
        panic!("no document node");
    };
    assert_eq!(version.as_deref(), Some("draft-2"));
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0].kind, AstNodeKind::Task { name, .. } if name == "Count"));
    assert!(matches!(&items[1].kind, AstNodeKind::Workflow { name, .. } if name == "tally"));
}

#[test]
fn types_parse_including_nested_and_optional() {
    let doc = parse_document_text(
        "types.wdl",
        "workflow w { Map[String, Array[Int]] index  Pair[Int, String] pair  Array[File]+ nonempty  Float? ratio }",
    )
    .expect("parse failed");
    let AstNodeKind::Document { items, .. } = &doc.kind else {
        panic!("no document node");
    };
    let AstNodeKind::Workflow { body, .. } = &items[0].kind else {
        panic!("no workflow node");
    };
    let types: Vec<&WdlType> = body
        .iter()
        .filter_map(|d| match &d.kind {
            AstNodeKind::Declaration { ty, .. } => Some(ty),
            _ => None,
        })
        .collect();
    assert_eq!(
        *types[0],
        WdlType::Map(
            Box::new(WdlType::Str),
            Box::new(WdlType::Array(Box::new(WdlType::Int)))
        )
    );
    assert_eq!(
        *types[1],
        WdlType::Pair(Box::new(WdlType::Int), Box::new(WdlType::Str))
    );
    assert_eq!(*types[2], WdlType::Array(Box::new(WdlType::File)));
    assert_eq!(*types[3], WdlType::Optional(Box::new(WdlType::Float)));
}

#[test]
fn writer_output_reparses_to_the_same_shape() {
    let doc = parse_document_text("sample.wdl", SAMPLE).expect("parse failed");
    let rendered = writer::document_text(&doc);
    let again = parse_document_text("rendered.wdl", &rendered)
        .unwrap_or_else(|e| panic!("rendered text must re-parse: {}\n{}", e.message(), rendered));

    let AstNodeKind::Document { items, .. } = &again.kind else {
        panic!("no document node");
    };
    assert_eq!(items.len(), 2);
    // Command text survives the round trip.
    let rendered_again = writer::document_text(&again);
    assert!(rendered_again.contains("wc -l data.txt"));
}

#[test]
fn command_braced_form_with_placeholders() {
    let doc = parse_document_text(
        "braced.wdl",
        "task t { File f\n command { cat ${f} > out.txt }\n output { File out = \"out.txt\" } }",
    )
    .expect("parse failed");
    let AstNodeKind::Document { items, .. } = &doc.kind else {
        panic!("no document node");
    };
    let AstNodeKind::Task { sections, .. } = &items[0].kind else {
        panic!("no task node");
    };
    let command = sections
        .iter()
        .find_map(|s| match &s.kind {
            AstNodeKind::CommandSection { text } => Some(text.clone()),
            _ => None,
        })
        .expect("no command section");
    assert!(command.contains("${f}"));
}

#[test]
fn scan_recovers_verbatim_task_text() {
    let sources = extract_task_sources(SAMPLE);
    let count = sources.get("Count").expect("task Count not found");
    assert!(count.starts_with("task Count"));
    assert!(count.contains("wc -l data.txt"));
    assert!(count.trim_end().ends_with('}'));
    assert_eq!(sources.len(), 1);
}

#[test]
fn evaluator_folds_arithmetic_and_strings() {
    let probe = |text: &str| {
        let doc = parse_document_text(
            "eval.wdl",
            &format!("workflow w {{ Int probe = {} }}", text),
        )
        .expect("parse failed");
        let AstNodeKind::Document { items, .. } = &doc.kind else {
            panic!("no document");
        };
        let AstNodeKind::Workflow { body, .. } = &items[0].kind else {
            panic!("no workflow");
        };
        let AstNodeKind::Declaration { expr, .. } = &body[0].kind else {
            panic!("no declaration");
        };
        expr.as_ref().unwrap().as_ref().clone()
    };

    assert_eq!(evaluate_const(&probe("2 + 3 * 4")), Ok(Value::Int(14)));
    assert_eq!(
        evaluate_const(&probe("\"a\" + \"b\"")),
        Ok(Value::Str("ab".to_string()))
    );
    assert_eq!(evaluate_const(&probe("5 > 2")), Ok(Value::Bool(true)));
    assert_eq!(
        evaluate_const(&probe("[1, 2][0]")),
        Ok(Value::Int(1))
    );

    // A dynamic name is "not a constant", never a crash.
    assert_eq!(
        evaluate_const(&probe("mystery + 1")),
        Err(EvalError::NotConstant("mystery".to_string()))
    );

    // The same name folds once the lookup can supply it.
    let lookup = |name: &str| {
        if name == "mystery" {
            Some(Value::Int(9))
        } else {
            None
        }
    };
    assert_eq!(evaluate(&probe("mystery + 1"), &lookup), Ok(Value::Int(10)));
}

#[test]
fn validator_rejects_computed_scatter_collections() {
    let doc = parse_document_text(
        "bad.wdl",
        r#"
task Step {
    Int i
    command <<< echo >>>
    output {
        Int out = 0
    }
}

workflow w {
  Array[Int] xs
  scatter (x in range(10)) {
    call Step { input: i = x }
  }
}
"#,
    )
    .expect("parse failed");
    let diagnostics = analyze_document_rules(&doc).expect_err("validation should fail");
    assert!(
        diagnostics
            .iter()
            .any(|d| d.message().contains("scatter collection")),
        "unexpected diagnostics"
    );
}

#[test]
fn validator_rejects_duplicate_tasks_and_unknown_calls() {
    let doc = parse_document_text(
        "dup.wdl",
        r#"
task A {
    Int i
    command <<< echo >>>
}

task A {
    Int j
    command <<< echo >>>
}

workflow w {
  call B
}
"#,
    )
    .expect("parse failed");
    let diagnostics = analyze_document_rules(&doc).expect_err("validation should fail");
    assert!(diagnostics.iter().any(|d| d.message().contains("Duplicate task name")));
    assert!(diagnostics.iter().any(|d| d.message().contains("unknown task")));
}

#[test]
fn source_loads_from_disk() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "workflow w {{ Int n }}").expect("write failed");
    let source = Source::new(file.path().to_path_buf()).expect("load failed");
    assert!(!source.is_empty());
    assert!(source.content.contains("workflow w"));
}

#[test]
fn missing_source_is_an_error() {
    assert!(Source::new(std::path::PathBuf::from("/no/such/file.wdl")).is_err());
}
