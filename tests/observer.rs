use anyhow::Result;
use gridsource::datasource::archive::staging_temp_path;
use gridsource::datasource::archive::zip::ZipArchiveDataSource;
use gridsource::datasource::directory::DirectoryDataSource;
use gridsource::datasource::memory::InMemoryDataSource;
use gridsource::datasource::{DataSource, ReadOnlyDataSource};
use gridsource::testing::{RecordingObserver, StreamEvent, TempDirPath, read_member, write_member};
use std::fs;
use std::io::Write;
use std::sync::Arc;

fn paired(name: &str) -> [StreamEvent; 2] {
    [
        StreamEvent::Opened(name.to_string()),
        StreamEvent::Closed(name.to_string()),
    ]
}

#[test]
fn test_directory_streams_report_file_paths() -> Result<()> {
    let dir = TempDirPath::new()?;
    let observer = Arc::new(RecordingObserver::new());
    let source = DirectoryDataSource::new(dir.path(), "net").with_observer(observer.clone());

    write_member(&source, "net.xiidm", b"<network/>")?;
    read_member(&source, "net.xiidm")?;

    let path = dir.file_path("net.xiidm").display().to_string();
    assert_eq!(observer.events(), [paired(&path), paired(&path)].concat());
    assert_eq!(observer.open_streams(), 0);
    Ok(())
}

#[test]
fn test_missing_member_opens_nothing() -> Result<()> {
    let dir = TempDirPath::new()?;
    let observer = Arc::new(RecordingObserver::new());
    let source = DirectoryDataSource::new(dir.path(), "net").with_observer(observer.clone());
    assert!(source.new_input_stream("net.xiidm")?.is_none());
    assert!(observer.events().is_empty());
    Ok(())
}

#[test]
fn test_open_stream_is_counted_until_dropped() -> Result<()> {
    let observer = Arc::new(RecordingObserver::new());
    let source = InMemoryDataSource::new("net").with_observer(observer.clone());
    source.put_data("net.xiidm", b"<network/>".to_vec());

    let stream = source.new_input_stream("net.xiidm")?;
    assert_eq!(observer.open_streams(), 1);
    drop(stream);
    assert_eq!(observer.open_streams(), 0);
    assert_eq!(observer.events(), paired("net.xiidm"));
    Ok(())
}

#[test]
fn test_dropped_archive_writer_is_closed() -> Result<()> {
    let dir = TempDirPath::new()?;
    let observer = Arc::new(RecordingObserver::new());
    let source =
        ZipArchiveDataSource::new(dir.path(), "net.zip", "net").with_observer(observer.clone());

    let mut writer = source.new_output_stream("net.xiidm", false)?;
    writer.write_all(b"never committed")?;
    drop(writer);

    let label = format!("{}:net.xiidm", source.archive_path().display());
    assert_eq!(observer.events(), paired(&label));
    assert!(!source.exists("net.xiidm")?);
    Ok(())
}

#[test]
fn test_failed_close_still_reports_closed() -> Result<()> {
    let dir = TempDirPath::new()?;
    let observer = Arc::new(RecordingObserver::new());
    let source =
        ZipArchiveDataSource::new(dir.path(), "net.zip", "net").with_observer(observer.clone());
    fs::create_dir(staging_temp_path(&source.archive_path()))?;

    let mut writer = source.new_output_stream("net.xiidm", false)?;
    writer.write_all(b"data")?;
    assert!(writer.close().is_err());

    assert_eq!(observer.events().len(), 2);
    assert_eq!(observer.open_streams(), 0);
    Ok(())
}
