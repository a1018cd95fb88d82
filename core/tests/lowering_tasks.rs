use stagehand_core::ast::parse_document_text;
use stagehand_core::ir::model::{AppletKind, DockerImage, InstanceType, Namespace};
use stagehand_core::ir::{CompileOptions, lower_namespace};

fn lower(text: &str) -> Namespace {
    let doc = parse_document_text("tasks.wdl", text).expect("parse failed");
    lower_namespace(&doc, Some(text), CompileOptions::default()).expect("lowering failed")
}

const ADD: &str = r#"
task Add {
    Int a
    Int b
    command <<< echo $((a + b)) >>>
    output {
        Int result = 0
    }
}
"#;

#[test]
fn plain_task_lowers_to_default_applet() {
    let namespace = lower(ADD);
    let applet = namespace.applet("Add").expect("no Add applet");

    assert_eq!(applet.kind, AppletKind::Task);
    assert_eq!(applet.instance_type, InstanceType::Default);
    assert_eq!(applet.docker, DockerImage::None);

    let input_names: Vec<&str> = applet.inputs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(input_names, vec!["a", "b"]);
    let output_names: Vec<&str> = applet.outputs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(output_names, vec!["result"]);
}

#[test]
fn assigned_non_optional_declarations_are_not_inputs() {
    let namespace = lower(
        r#"
task Filter {
    File data
    Int threshold = 10
    String? label = "none"
    command <<< true >>>
    output {
        File kept = "kept"
    }
}
"#,
    );
    let applet = namespace.applet("Filter").expect("no Filter applet");
    let input_names: Vec<&str> = applet.inputs.iter().map(|c| c.name.as_str()).collect();
    // `threshold` is a task-local computed value; `label` stays an input
    // because its type is optional.
    assert_eq!(input_names, vec!["data", "label"]);
}

#[test]
fn constant_resources_resolve_to_const_instance() {
    let namespace = lower(
        r#"
task Big {
    Int n
    command <<< true >>>
    runtime {
        memory: "2 GiB"
        cpu: 4
        disks: "local-disk 100 SSD"
    }
    output {
        Int out = 0
    }
}
"#,
    );
    let applet = namespace.applet("Big").expect("no Big applet");
    match &applet.instance_type {
        InstanceType::Const(spec) => {
            assert_eq!(spec.memory_mb, Some(2048));
            assert_eq!(spec.cpu, Some(4));
            assert_eq!(spec.disk_gb, Some(100));
        }
        other => panic!("expected a const instance type, found {:?}", other),
    }
}

#[test]
fn runtime_dependent_resources_resolve_to_runtime_instance() {
    let namespace = lower(
        r#"
task Sized {
    Int n
    Int mem = n * 2
    command <<< true >>>
    runtime {
        memory: mem
    }
    output {
        Int out = 0
    }
}
"#,
    );
    let applet = namespace.applet("Sized").expect("no Sized applet");
    assert_eq!(applet.instance_type, InstanceType::Runtime);
}

#[test]
fn network_docker_image() {
    let namespace = lower(
        r#"
task Boxed {
    Int n
    command <<< true >>>
    runtime {
        docker: "ubuntu:20.04"
    }
    output {
        Int out = 0
    }
}
"#,
    );
    let applet = namespace.applet("Boxed").expect("no Boxed applet");
    assert_eq!(applet.docker, DockerImage::Network);
}

#[test]
fn asset_docker_image_is_pinned_and_rewritten() {
    let namespace = lower(
        r#"
task Pinned {
    Int n
    command <<< true >>>
    runtime {
        docker: "asset://" + "images/alpine"
    }
    output {
        Int out = 0
    }
}
"#,
    );
    let applet = namespace.applet("Pinned").expect("no Pinned applet");
    assert_eq!(
        applet.docker,
        DockerImage::PlatformAsset("asset://images/alpine".to_string())
    );
    // The emitted sub-program carries the folded reference, not the
    // original concatenation.
    assert!(
        applet.code.contains("\"asset://images/alpine\""),
        "code not rewritten: {}",
        applet.code
    );
}

#[test]
fn native_metadata_produces_a_stub() {
    let namespace = lower(
        r#"
task Prebuilt {
    File data
    meta {
        type: "native"
        id: "app-12345"
    }
    output {
        File out
    }
}
"#,
    );
    let applet = namespace.applet("Prebuilt").expect("no Prebuilt applet");
    assert_eq!(applet.kind, AppletKind::NativeStub("app-12345".to_string()));
}

#[test]
fn emitted_task_code_reparses() {
    let namespace = lower(ADD);
    let applet = namespace.applet("Add").expect("no Add applet");
    parse_document_text("reparse.wdl", &applet.code).expect("emitted code must re-parse");
}

#[test]
fn verbatim_task_source_is_attached() {
    let namespace = lower(ADD);
    let applet = namespace.applet("Add").expect("no Add applet");
    let source = applet.source_text.as_deref().expect("no task source attached");
    assert!(source.starts_with("task Add"));
    assert!(source.contains("command"));
}
