use assert_cmd::Command;
use std::path::PathBuf;

fn sample_path(name: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let mut path = PathBuf::from(manifest_dir);
    path.push("samples");
    path.push(name);
    path
}

#[test]
fn build_sample_emits_namespace_json() {
    let output = Command::cargo_bin("stagehand")
        .expect("binary not built")
        .arg("build")
        .arg(sample_path("align.wdl"))
        .output()
        .expect("failed to spawn stagehand binary");

    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"applets\""), "missing applets: {}", stdout);
    assert!(stdout.contains("bwa_align"), "missing task applet: {}", stdout);
    // The scatter block becomes its own generated applet.
    assert!(stdout.contains("scatter_"), "missing scatter applet: {}", stdout);
}

#[test]
fn build_rejects_missing_file() {
    Command::cargo_bin("stagehand")
        .expect("binary not built")
        .arg("build")
        .arg(sample_path("no_such.wdl"))
        .assert()
        .failure();
}
