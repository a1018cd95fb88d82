use stagehand_core::ast::parse_document_text;
use stagehand_core::ast::WdlType;
use stagehand_core::ir::model::{AppletKind, Namespace};
use stagehand_core::ir::{CompileOptions, LoweringError, LoweringErrorKind, lower_namespace};

fn lower(text: &str) -> Result<Namespace, LoweringError> {
    let doc = parse_document_text("blocks.wdl", text).expect("parse failed");
    lower_namespace(&doc, Some(text), CompileOptions::default())
}

const INC: &str = r#"
task Inc {
    Int i
    command <<< echo >>>
    output {
        Int out = 0
    }
}
"#;

fn int_array() -> WdlType {
    WdlType::Array(Box::new(WdlType::Int))
}

#[test]
fn scatter_promotes_call_outputs_to_arrays() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Array[Int] xs\n  scatter (x in xs) {{\n    call Inc {{ input: i = x }}\n  }}\n}}\n",
        INC
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let stage = &workflow.stages[0];
    assert!(stage.name.starts_with("scatter_"));
    let out = stage
        .outputs
        .iter()
        .find(|c| c.name == "Inc.out")
        .expect("scatter exports no Inc.out");
    assert_eq!(out.ty, int_array());
}

#[test]
fn conditional_promotes_call_outputs_to_optionals() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Int n\n  Boolean go\n  if (go) {{\n    call Inc {{ input: i = n }}\n  }}\n}}\n",
        INC
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let stage = &workflow.stages[0];
    assert!(stage.name.starts_with("if_"));
    let out = stage
        .outputs
        .iter()
        .find(|c| c.name == "Inc.out")
        .expect("conditional exports no Inc.out");
    assert_eq!(out.ty, WdlType::Optional(Box::new(WdlType::Int)));
}

#[test]
fn already_optional_output_is_not_double_wrapped() {
    let namespace = lower(
        r#"
task Note {
    Int i
    command <<< echo >>>
    output {
        String? remark = "fine"
    }
}

workflow w {
  Int n
  Boolean go
  if (go) {
    call Note { input: i = n }
  }
}
"#,
    )
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let out = workflow.stages[0]
        .outputs
        .iter()
        .find(|c| c.name == "Note.remark")
        .expect("conditional exports no Note.remark");
    assert_eq!(out.ty, WdlType::Optional(Box::new(WdlType::Str)));
}

#[test]
fn scatter_block_applet_kind_and_callees() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Array[Int] xs\n  scatter (x in xs) {{\n    call Inc {{ input: i = x }}\n  }}\n}}\n",
        INC
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let applet = namespace
        .applets
        .get(&workflow.stages[0].applet)
        .expect("scatter applet missing from namespace");
    assert_eq!(applet.kind, AppletKind::Scatter(vec!["Inc".to_string()]));
}

#[test]
fn scatter_over_array_outputs_needs_collection() {
    let namespace = lower(
        r#"
task SplitWords {
    String line
    command <<< echo >>>
    output {
        Array[String] words = ["a"]
    }
}

workflow w {
  Array[String] lines
  scatter (line in lines) {
    call SplitWords { input: line = line }
  }
}
"#,
    )
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let applet = namespace
        .applets
        .get(&workflow.stages[0].applet)
        .expect("scatter applet missing from namespace");
    // Array[Array[String]] has no direct platform slot.
    assert_eq!(
        applet.kind,
        AppletKind::ScatterCollect(vec!["SplitWords".to_string()])
    );
}

#[test]
fn block_closure_becomes_the_applet_inputs() {
    let namespace = lower(
        r#"
task AddOff {
    Int i
    Int off
    command <<< echo >>>
    output {
        Int out = 0
    }
}

workflow w {
  Array[Int] xs
  Int offset
  scatter (x in xs) {
    call AddOff { input: i = x, off = offset }
  }
}
"#,
    )
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let applet = namespace
        .applets
        .get(&workflow.stages[0].applet)
        .expect("scatter applet missing from namespace");
    let input_names: Vec<&str> = applet.inputs.iter().map(|c| c.name.as_str()).collect();
    // Stable (sorted) closure order; the scatter variable is not an input.
    assert_eq!(input_names, vec!["offset", "xs"]);
}

#[test]
fn preceding_declarations_pass_through_unpromoted() {
    // `ys` sits between the first stage and the scatter, so the splitter
    // hands it to the block as a preceding declaration.
    let namespace = lower(
        r#"
task MakeRange {
    Int n
    command <<< echo >>>
    output {
        Array[Int] arr = [1, 2]
    }
}

task Inc {
    Int i
    command <<< echo >>>
    output {
        Int out = 0
    }
}

workflow w {
  Int n
  call MakeRange { input: n = n }
  Array[Int] ys = MakeRange.arr
  scatter (y in ys) {
    call Inc { input: i = y }
  }
}
"#,
    )
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let stage = workflow
        .stages
        .iter()
        .find(|s| s.name.starts_with("scatter_"))
        .expect("no scatter stage");
    let ys = stage
        .outputs
        .iter()
        .find(|c| c.name == "ys")
        .expect("preceding declaration not exported");
    assert_eq!(ys.ty, int_array());
}

#[test]
fn user_named_block_declaration_is_conservatively_exported() {
    // `doubled` is read only inside its own block, yet it is still exported
    // because only generated (xtmp-prefixed) names qualify for the
    // local-only exclusion. Documented conservatism, kept on purpose.
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Array[Int] xs\n  scatter (x in xs) {{\n    Int doubled = x * 2\n    call Inc {{ input: i = doubled }}\n  }}\n}}\n",
        INC
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let doubled = workflow.stages[0]
        .outputs
        .iter()
        .find(|c| c.name == "doubled")
        .expect("user-named declaration was not exported");
    assert_eq!(doubled.ty, int_array());
}

#[test]
fn generated_block_declaration_is_excluded_from_outputs() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Array[Int] xs\n  scatter (x in xs) {{\n    Int xtmp1 = x * 2\n    call Inc {{ input: i = xtmp1 }}\n  }}\n}}\n",
        INC
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    assert!(
        workflow.stages[0]
            .outputs
            .iter()
            .all(|c| c.name != "xtmp1"),
        "generated declaration leaked into block outputs"
    );
}

#[test]
fn nested_blocks_are_unsupported() {
    let err = lower(&format!(
        "{}\nworkflow w {{\n  Array[Int] xs\n  Boolean go\n  scatter (x in xs) {{\n    if (go) {{\n      call Inc {{ input: i = x }}\n    }}\n  }}\n}}\n",
        INC
    ))
    .expect_err("lowering should fail");
    assert_eq!(err.kind(), LoweringErrorKind::UnsupportedBlockElement);
}

#[test]
fn block_applet_code_reparses() {
    let namespace = lower(&format!(
        "{}\nworkflow w {{\n  Array[Int] xs\n  scatter (x in xs) {{\n    call Inc {{ input: i = x }}\n  }}\n}}\n",
        INC
    ))
    .expect("lowering failed");

    let workflow = namespace.workflow.expect("no workflow");
    let applet = namespace
        .applets
        .get(&workflow.stages[0].applet)
        .expect("scatter applet missing from namespace");
    parse_document_text("reparse.wdl", &applet.code).expect("emitted code must re-parse");
    // The sub-program carries a signature stub for the callee.
    assert!(applet.code.contains("task Inc"), "no stub: {}", applet.code);
}
