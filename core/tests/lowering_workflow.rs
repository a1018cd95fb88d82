use stagehand_core::ast::parse_document_text;
use stagehand_core::ir::model::{AppletKind, Namespace, SArg};
use stagehand_core::ir::value::Value;
use stagehand_core::ir::{CompileOptions, LoweringError, LoweringErrorKind, lower_namespace};

fn lower(text: &str) -> Result<Namespace, LoweringError> {
    let doc = parse_document_text("wf.wdl", text).expect("parse failed");
    lower_namespace(&doc, Some(text), CompileOptions::default())
}

fn lower_with(text: &str, options: CompileOptions) -> Result<Namespace, LoweringError> {
    let doc = parse_document_text("wf.wdl", text).expect("parse failed");
    lower_namespace(&doc, Some(text), options)
}

const ADD: &str = r#"
task Add {
    Int a
    Int b
    command <<< echo >>>
    output {
        Int result = 0
    }
}
"#;

const ADD_WORKFLOW: &str = r#"
workflow w {
  Int ai
  call Add { input: a = ai, b = 3 }
  Int x = Add.result + 10
}
"#;

#[test]
fn call_then_eval_end_to_end() {
    let namespace = lower(&format!("{}{}", ADD, ADD_WORKFLOW)).expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    assert_eq!(workflow.stages.len(), 2);

    // The call stage: one workflow-input argument, one constant.
    let call_stage = &workflow.stages[0];
    assert_eq!(call_stage.name, "Add");
    match &call_stage.inputs[0] {
        SArg::WorkflowInput(cvar) => assert_eq!(cvar.name, "ai"),
        other => panic!("expected a workflow input, found {:?}", other),
    }
    assert_eq!(call_stage.inputs[1], SArg::Const(Value::Int(3)));

    // The synthetic eval stage computes x from exactly {Add.result}.
    let eval_stage = &workflow.stages[1];
    assert!(eval_stage.name.starts_with("eval_"));
    let eval_applet = namespace
        .applets
        .get(&eval_stage.applet)
        .expect("eval applet missing");
    assert_eq!(eval_applet.kind, AppletKind::Eval);
    let input_names: Vec<&str> = eval_applet.inputs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(input_names, vec!["Add.result"]);
    let output_names: Vec<&str> = eval_applet.outputs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(output_names, vec!["x"]);

    // The eval stage links to the call stage's output.
    match &eval_stage.inputs[0] {
        SArg::Link { stage, cvar } => {
            assert_eq!(stage, "Add");
            assert_eq!(cvar.name, "result");
        }
        other => panic!("expected a link, found {:?}", other),
    }

    // One declared input, no declared outputs.
    let input_names: Vec<&str> = workflow
        .inputs
        .iter()
        .map(|(cvar, _)| cvar.name.as_str())
        .collect();
    assert_eq!(input_names, vec!["ai"]);
    assert!(workflow.outputs.is_empty());
}

#[test]
fn stage_ids_are_strictly_increasing() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Int ai\n  call Add {{ input: a = ai, b = 1 }}\n  Int x = Add.result + 1\n  call Add as more {{ input: a = ai, b = 2 }}\n}}\n",
        ADD
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let ids: Vec<u32> = workflow.stages.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn constant_input_default_is_recorded() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Int ai = 5\n  call Add {{ input: a = ai, b = 1 }}\n}}\n",
        ADD
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let (cvar, _) = &workflow.inputs[0];
    assert_eq!(cvar.attrs.default, Some(Value::Int(5)));
}

#[test]
fn non_constant_input_default_is_an_error() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  Int a = 3\n  Int b = a + 1\n  call Add {{ input: a = a, b = b }}\n}}\n",
        ADD
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::WorkflowInputDefaultNotConst);
}

#[test]
fn outputs_resolve_through_the_final_environment() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Int ai\n  call Add {{ input: a = ai, b = 3 }}\n  Int x = Add.result + 10\n  output {{\n    Int total = x\n    Int raw = Add.result\n    Int magic = 42\n  }}\n}}\n",
        ADD
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    assert_eq!(workflow.outputs.len(), 3);

    let (_, total) = &workflow.outputs[0];
    assert!(matches!(total, SArg::Link { stage, .. } if stage.starts_with("eval_")));

    let (_, raw) = &workflow.outputs[1];
    assert!(matches!(raw, SArg::Link { stage, .. } if stage == "Add"));

    let (_, magic) = &workflow.outputs[2];
    assert_eq!(magic, &SArg::Const(Value::Int(42)));
}

#[test]
fn computed_output_expression_is_unsupported() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  Int ai\n  call Add {{ input: a = ai, b = 3 }}\n  output {{\n    Int total = Add.result + 1\n  }}\n}}\n",
        ADD
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::UnsupportedOutputExpression);
}

#[test]
fn unbound_output_reference_is_missing() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  Int ai\n  call Add {{ input: a = ai, b = 3 }}\n  output {{\n    Int total = nothing_here\n  }}\n}}\n",
        ADD
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::MissingVariableReference);
}

#[test]
fn reorg_appends_a_final_stage_over_the_outputs() {
    let namespace = lower_with(
        &format!(
            "{}\nworkflow w {{\n  Int ai\n  call Add {{ input: a = ai, b = 3 }}\n  output {{\n    Int raw = Add.result\n  }}\n}}\n",
            ADD
        ),
        CompileOptions {
            destination: "/builds".to_string(),
            reorg: true,
        },
    )
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let last = workflow.stages.last().expect("no stages");
    assert_eq!(last.name, "reorg");
    assert_eq!(last.inputs.len(), workflow.outputs.len());

    let applet = namespace.applets.get("reorg").expect("no reorg applet");
    assert_eq!(applet.kind, AppletKind::OutputReorg);
    assert_eq!(applet.destination, "/builds");
    let names_in: Vec<&str> = applet.inputs.iter().map(|c| c.name.as_str()).collect();
    let names_out: Vec<&str> = applet.outputs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names_in, vec!["raw"]);
    assert_eq!(names_out, names_in);
}

#[test]
fn namespace_without_workflow_holds_only_applets() {
    let namespace = lower(ADD).expect("lowering failed");
    assert!(namespace.workflow.is_none());
    assert_eq!(namespace.applets.len(), 1);
}

#[test]
fn namespace_serializes_to_plain_json() {
    let namespace = lower(&format!("{}{}", ADD, ADD_WORKFLOW)).expect("lowering failed");
    let rendered = serde_json::to_string(&namespace).expect("serialization failed");
    assert!(rendered.contains("\"applets\""));
    assert!(rendered.contains("\"stages\""));
}
