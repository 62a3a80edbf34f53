use std::fs;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;

fn qconv(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qconv")).args(args).output().unwrap()
}

fn stdout(out: &Output) -> String { String::from_utf8_lossy(&out.stdout).trim().to_string() }

fn write_plan(name: &str, body: &str) -> String {
    fs::create_dir_all("target").unwrap();
    let path = format!("target/{name}");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn shape_prints_output_dim() {
    let out = qconv(&["shape", "--input", "224", "--kernel", "7", "--padding", "3", "--stride", "2"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "112");

    let out = qconv(&["shape", "--input", "2", "--kernel", "5"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "-2");
}

#[test]
fn shape_rejects_zero_stride() {
    let out = qconv(&["shape", "--input", "8", "--kernel", "3", "--stride", "0"]);
    assert!(!out.status.success());
}

#[test]
fn plan_prints_report() {
    let path = write_plan(
        "qconv_cli_plan.json",
        r#"{"weight_shape": [16, 8, 3, 3], "scale": 0.5, "zero_point": 10, "dtype": "quint8", "padding": 1}"#,
    );
    let out = qconv(&["plan", "--config", &path, "--input", "1,8,28,28"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        stdout(&out),
        "in_channels: 8\n\
         out_channels: 16\n\
         layer: QuantizedConv2d(8, 16, kernel_size=(3, 3), stride=(1, 1), padding=(1, 1), scale=0.5, zero_point=10, dtype=quint8)\n\
         output: [1, 16, 28, 28]"
    );
}

#[test]
fn plan_padding_mode_override_is_rejected() {
    let path = write_plan(
        "qconv_cli_plan_override.json",
        r#"{"weight_shape": [4, 4, 3, 3], "scale": 1.0, "zero_point": 0, "dtype": "qint8"}"#,
    );
    let out = qconv(&["plan", "--config", &path, "--input", "1,4,8,8", "--padding-mode", "reflect"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("reflect"));

    let out = qconv(&["plan", "--config", &path, "--input", "1,4,8,8", "--padding-mode", "zero"]);
    assert!(out.status.success());
}

#[test]
fn plan_missing_file_fails() {
    let out = qconv(&["plan", "--config", "target/qconv_cli_missing.json", "--input", "1,4,8,8"]);
    assert!(!out.status.success());
}
