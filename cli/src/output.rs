use comfy_table::Table;
use console::Style;
use stagehand_core::{Namespace, StagehandErrorExt};

/// Print one styled diagnostic line for an error.
pub fn print_diagnostic(error: &dyn StagehandErrorExt) {
    let style = Style::new().red().bold();
    eprintln!(
        "{} {}",
        style.apply_to(format!("[{}]", error.level())),
        error.message()
    );
    if let Some(location) = error.location() {
        eprintln!("  at {}", location);
    }
}

/// Render applets and stages as tables.
pub fn print_namespace_tables(namespace: &Namespace) {
    let mut applet_table = Table::new();
    applet_table.set_header(vec!["applet", "kind", "inputs", "outputs", "instance", "docker"]);
    for applet in namespace.applets.values() {
        applet_table.add_row(vec![
            applet.name.clone(),
            applet.kind.label().to_string(),
            applet.inputs.len().to_string(),
            applet.outputs.len().to_string(),
            format!("{:?}", applet.instance_type),
            format!("{:?}", applet.docker),
        ]);
    }
    println!("{}", applet_table);

    if let Some(workflow) = &namespace.workflow {
        let mut stage_table = Table::new();
        stage_table.set_header(vec!["id", "stage", "applet", "arguments"]);
        for stage in &workflow.stages {
            stage_table.add_row(vec![
                stage.id.to_string(),
                stage.name.clone(),
                stage.applet.clone(),
                stage.inputs.len().to_string(),
            ]);
        }
        println!("{}", stage_table);
    }
}
