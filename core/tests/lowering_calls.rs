use stagehand_core::ast::parse_document_text;
use stagehand_core::ir::model::{Namespace, SArg};
use stagehand_core::ir::value::Value;
use stagehand_core::ir::{CompileOptions, LoweringError, LoweringErrorKind, lower_namespace};

fn lower(text: &str) -> Result<Namespace, LoweringError> {
    let doc = parse_document_text("calls.wdl", text).expect("parse failed");
    lower_namespace(&doc, Some(text), CompileOptions::default())
}

const CONCAT: &str = r#"
task Concat {
    String a
    String? b
    command <<< echo >>>
    output {
        String joined = "x"
    }
}
"#;

#[test]
fn unbound_optional_argument_resolves_to_empty() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  String s\n  call Concat {{ input: a = s }}\n}}\n",
        CONCAT
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let stage = &workflow.stages[0];
    assert_eq!(stage.name, "Concat");
    assert_eq!(stage.inputs.len(), 2);
    assert!(matches!(stage.inputs[0], SArg::WorkflowInput(_)));
    assert_eq!(stage.inputs[1], SArg::Empty);
}

#[test]
fn unbound_required_argument_is_an_error_naming_the_parameter() {
    let err = lower(&format!("{}\nworkflow w {{\n  call Concat\n}}\n", CONCAT))
        .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::MissingRequiredArgument);
    let message = format!("{}", err);
    assert!(message.contains("Concat"), "message: {}", message);
    assert!(message.contains("input a"), "message: {}", message);
}

#[test]
fn constant_argument_is_folded() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  call Concat {{ input: a = \"hello\" }}\n}}\n",
        CONCAT
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let stage = &workflow.stages[0];
    assert_eq!(stage.inputs[0], SArg::Const(Value::Str("hello".to_string())));
}

#[test]
fn alias_names_the_stage() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  String s\n  call Concat as greet {{ input: a = s }}\n}}\n",
        CONCAT
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    assert_eq!(workflow.stages[0].name, "greet");
}

#[test]
fn dotted_argument_resolves_against_a_prior_stage() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  String s\n  call Concat as first {{ input: a = s }}\n  call Concat as second {{ input: a = first.joined }}\n}}\n",
        CONCAT
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let second = &workflow.stages[1];
    match &second.inputs[0] {
        SArg::Link { stage, cvar } => {
            assert_eq!(stage, "first");
            assert_eq!(cvar.name, "joined");
        }
        other => panic!("expected a link argument, found {:?}", other),
    }
}

#[test]
fn undefined_task_is_fatal() {
    let err = lower("workflow w {\n  call Nothing\n}\n").expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::UndefinedTask);
}

#[test]
fn reserved_stage_name_is_rejected() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  String s\n  call Concat as scatter_things {{ input: a = s }}\n}}\n",
        CONCAT
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::IllegalStageName);
}

#[test]
fn computed_call_argument_is_unsupported() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  String s\n  call Concat {{ input: a = s + \"!\" }}\n}}\n",
        CONCAT
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::UnsupportedCallArgument);
}

#[test]
fn unbound_identifier_argument_is_a_missing_reference() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  call Concat {{ input: a = ghost }}\n}}\n",
        CONCAT
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::MissingVariableReference);
}
