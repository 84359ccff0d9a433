use std::collections::HashMap;
use std::io::Cursor;

use anyhow::Result;
use inspection_core::InspectionError;
use inspection_domain::{LogSink, ScriptArchiver};
use inspection_infrastructure::{FileLogSink, ZipScriptArchiver};

#[tokio::test]
async fn test_file_log_sink_write_and_read() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = FileLogSink::new(dir.path());
    let lines = HashMap::from([
        ("group(node-b)".to_string(), "ecc error".to_string()),
        ("group(node-a)".to_string(), "ok".to_string()),
    ]);

    sink.write("20260101-000001", "ecc check", &lines).await?;

    let path = dir.path().join("20260101-000001").join("ecc_check.log");
    assert!(path.exists());
    let content = String::from_utf8(sink.read("20260101-000001", "ecc check").await?)?;
    assert_eq!(content, "group(node-a): ok\ngroup(node-b): ecc error\n");
    Ok(())
}

#[tokio::test]
async fn test_file_log_sink_missing_log() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = FileLogSink::new(dir.path());

    let err = sink.read("20260101-000001", "ecc_check").await.unwrap_err();
    assert!(matches!(err, InspectionError::LogNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_zip_archiver_packs_directory_recursively() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script_dir = dir.path().join("ecc_check");
    std::fs::create_dir_all(script_dir.join("lib"))?;
    std::fs::write(script_dir.join("main.sh"), "#!/bin/sh\necho ok\n")?;
    std::fs::write(script_dir.join("lib").join("util.sh"), "true\n")?;

    let archiver = ZipScriptArchiver::new(dir.path());
    let bundle = archiver.archive("ecc_check").await?;
    assert_eq!(bundle.file_name, "ecc_check.zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(bundle.data))?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.iter().any(|n| n == "main.sh"));
    assert!(names.iter().any(|n| n == "lib/util.sh"));

    let mut content = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("main.sh")?, &mut content)?;
    assert!(content.contains("echo ok"));
    Ok(())
}

#[tokio::test]
async fn test_zip_archiver_missing_script() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let archiver = ZipScriptArchiver::new(dir.path());

    let err = archiver.archive("missing").await.unwrap_err();
    assert!(matches!(err, InspectionError::ScriptNotFound(_)));
    Ok(())
}
